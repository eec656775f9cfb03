#![no_main]
use libfuzzer_sys::fuzz_target;
use sdat2img::image::{BLOCK_SIZE, ImageBuilder};
use sdat2img::transfer::parse_transfer_list;

fuzz_target!(|data: &[u8]| {
    // Parsing arbitrary bytes must never panic, only return errors.
    let Ok(list) = parse_transfer_list(data) else {
        return;
    };

    // Keep the image small enough to build in memory.
    if list.max_block() > 256 {
        return;
    }
    let blob = vec![0x5Au8; list.new_blocks().map_or(0, |n| n.min(256)) as usize * BLOCK_SIZE];
    let mut out = std::io::Cursor::new(Vec::new());
    let _ = ImageBuilder::new(&blob[..]).build(&list, &mut out);
});
