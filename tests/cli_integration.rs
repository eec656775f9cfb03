use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

const BLOCK: usize = 4096;

fn bin() -> String {
    env!("CARGO_BIN_EXE_sdat2img").to_string()
}

fn blocks(fill: &[u8]) -> Vec<u8> {
    fill.iter()
        .flat_map(|&b| std::iter::repeat_n(b, BLOCK))
        .collect()
}

fn write_inputs(dir: &Path, list: &str, data: &[u8]) -> (std::path::PathBuf, std::path::PathBuf) {
    let list_path = dir.join("system.transfer.list");
    let data_path = dir.join("system.new.dat");
    std::fs::write(&list_path, list).unwrap();
    std::fs::write(&data_path, data).unwrap();
    (list_path, data_path)
}

#[test]
fn cli_converts_to_explicit_output() {
    let dir = tempdir().unwrap();
    let (list, data) = write_inputs(dir.path(), "4\n10\n0\n0\nnew 4,0,2,8,10\n", &blocks(b"AABB"));
    let output = dir.path().join("out.img");

    let out = Command::new(bin())
        .arg(&list)
        .arg(&data)
        .arg(&output)
        .output()
        .unwrap();
    assert!(out.status.success());

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Android 7.x or above detected!"), "{stderr}");
    assert!(stderr.contains("Copying 2 blocks into position 8..."), "{stderr}");
    assert!(stderr.contains("Done! Output image:"), "{stderr}");

    let image = std::fs::read(&output).unwrap();
    assert_eq!(image.len(), 10 * BLOCK);
    assert_eq!(&image[..2 * BLOCK], &blocks(b"AA")[..]);
    assert_eq!(&image[8 * BLOCK..], &blocks(b"BB")[..]);
}

#[test]
fn cli_defaults_output_name() {
    let dir = tempdir().unwrap();
    let (list, data) = write_inputs(dir.path(), "1\n1\nnew 2,0,1\n", &blocks(b"Z"));

    let st = Command::new(bin())
        .current_dir(dir.path())
        .arg(&list)
        .arg(&data)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(dir.path().join("system.img")).unwrap(), blocks(b"Z"));
}

#[test]
fn cli_refuses_existing_output() {
    let dir = tempdir().unwrap();
    let (list, data) = write_inputs(dir.path(), "1\n1\nnew 2,0,1\n", &blocks(b"Z"));
    let output = dir.path().join("system.img");
    std::fs::write(&output, b"precious").unwrap();

    let out = Command::new(bin())
        .arg(&list)
        .arg(&data)
        .arg(&output)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("already exists"));
    assert_eq!(std::fs::read(&output).unwrap(), b"precious");
}

#[test]
fn cli_invalid_command_fails_without_output() {
    let dir = tempdir().unwrap();
    let (list, data) = write_inputs(dir.path(), "4\n1\n0\n0\nmove 2,0,1\n", &blocks(b"Z"));
    let output = dir.path().join("system.img");

    let out = Command::new(bin())
        .arg(&list)
        .arg(&data)
        .arg(&output)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("'move' is not a valid command"));
    assert!(!output.exists());
}

#[test]
fn cli_check_only_writes_nothing() {
    let dir = tempdir().unwrap();
    let (list, data) = write_inputs(dir.path(), "1\n3\nnew 2,0,1\nzero 2,1,3\n", &blocks(b"Z"));
    let output = dir.path().join("system.img");

    let out = Command::new(bin())
        .args(["--check-only", "--json", "--quiet"])
        .arg(&list)
        .arg(&data)
        .arg(&output)
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(!output.exists());

    let stderr = String::from_utf8_lossy(&out.stderr);
    let json: serde_json::Value = serde_json::from_str(stderr.trim()).unwrap();
    assert_eq!(json["command"], "check");
    assert_eq!(json["image_size"], 3 * BLOCK as u64);
    assert_eq!(json["skipped_commands"], 1);
}

#[test]
fn cli_requires_inputs() {
    let out = Command::new(bin()).output().unwrap();
    assert!(!out.status.success());
}
