/**
 * Batch token and destination filename generation
 */

use rand::Rng;

/// Length of the per-run batch token shared by all renamed files.
pub const TOKEN_LENGTH: usize = 8;

/// Zero-padding width for the numeric suffix of renamed files.
pub const COUNTER_PADDING: usize = 5;

/// Generate a random alphanumeric token of `length` characters.
///
/// Each position flips a coin between the digit and letter categories, then
/// picks uniformly within `0-9` or `a-z`. The result never ends in `'0'`:
/// a downstream numeric-suffix parser chokes on that, so a trailing zero is
/// replaced with a digit in `1-9`.
pub fn random_token<R: Rng>(rng: &mut R, length: usize) -> String {
    let mut token = String::with_capacity(length);
    for _ in 0..length {
        if rng.gen_bool(0.5) {
            token.push(char::from(b'0' + rng.gen_range(0..10u8)));
        } else {
            token.push(char::from(b'a' + rng.gen_range(0..26u8)));
        }
    }

    if token.ends_with('0') {
        token.pop();
        token.push(char::from(b'0' + rng.gen_range(1..10u8)));
    }
    token
}

/// Compute the destination name for the file at position `counter` in the
/// batch: `IMG_RENAME_<TOKEN><zero-padded counter>.JPG`.
pub fn renamed_filename(token: &str, counter: usize, padding: usize) -> String {
    format!(
        "IMG_RENAME_{}{:0width$}.JPG",
        token.to_uppercase(),
        counter,
        width = padding
    )
}
