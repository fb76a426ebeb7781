/// Letters used for generated prefixes. `x` is left out so that no
/// generated prefix can collide with the reserved `xml` prefixes.
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwyz";

/// Generates candidate namespace prefixes in a fixed order: `a` to `z`,
/// then `aa` to `zz`, then three letters, and so on.
///
/// The generator is infinite; callers pick the first candidate that is not
/// in use.
#[derive(Debug, Default)]
pub(crate) struct PrefixGenerator {
    counter: usize,
}

impl PrefixGenerator {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl Iterator for PrefixGenerator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        // bijective base-25 numbering
        let mut n = self.counter + 1;
        self.counter += 1;
        let mut letters = Vec::new();
        while n > 0 {
            n -= 1;
            letters.push(LETTERS[n % LETTERS.len()]);
            n /= LETTERS.len();
        }
        letters.reverse();
        Some(letters.into_iter().map(char::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_letters() {
        let prefixes: Vec<String> = PrefixGenerator::new().take(3).collect();
        assert_eq!(prefixes, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_skips_x() {
        let prefixes: Vec<String> = PrefixGenerator::new().take(25).collect();
        assert_eq!(prefixes[22], "w");
        assert_eq!(prefixes[23], "y");
        assert_eq!(prefixes[24], "z");
    }

    #[test]
    fn test_grows_to_two_letters() {
        let prefixes: Vec<String> = PrefixGenerator::new().skip(25).take(2).collect();
        assert_eq!(prefixes, vec!["aa", "ab"]);
        let last_two = PrefixGenerator::new().nth(25 + 25 * 25 - 1).unwrap();
        assert_eq!(last_two, "zz");
        let first_three = PrefixGenerator::new().nth(25 + 25 * 25).unwrap();
        assert_eq!(first_three, "aaa");
    }
}
