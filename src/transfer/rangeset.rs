// Rangeset token decoding.
//
// Format: `<count>,<v1>,<v2>,...,<vN>` where `count == N` and N is even.
// Values pair up as `[v1, v2), [v3, v4), ...` in token order.

use super::BlockRange;
use super::parser::ParseError;

/// Decode a rangeset token into its block ranges.
///
/// Any non-numeric value, a count that disagrees with the number of values,
/// an odd value count, or a range with `end <= start` is rejected. Errors
/// echo the original token.
pub fn parse_rangeset(token: &str) -> Result<Vec<BlockRange>, ParseError> {
    let invalid = || ParseError::InvalidRangeset {
        token: token.to_string(),
    };

    let mut fields = token.split(',');
    let count: usize = fields
        .next()
        .and_then(|f| f.parse().ok())
        .ok_or_else(invalid)?;

    let values = fields
        .map(|f| f.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;

    if values.len() != count || values.len() % 2 != 0 {
        return Err(invalid());
    }

    values
        .chunks_exact(2)
        .map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            if end <= start {
                return Err(ParseError::InvalidRange {
                    token: token.to_string(),
                    start,
                    end,
                });
            }
            Ok(BlockRange::new(start, end))
        })
        .collect()
}
