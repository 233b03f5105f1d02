use lazy_static::lazy_static;

const RUSSIAN_WORDS: &str = include_str!("words_ru.txt");
const GENERAL_WORDS: &str = include_str!("words_en.txt");

lazy_static! {
    pub static ref PROFANITY: ProfanityFilter =
        ProfanityFilter::from_lists(&[RUSSIAN_WORDS, GENERAL_WORDS]);
}

/// Word-list based filter. A list line prefixed with `=` matches a whole
/// word only; any other line matches as a fragment of a word.
#[derive(Debug, Default)]
pub struct ProfanityFilter {
    exact: Vec<String>,
    fragments: Vec<String>,
}

fn normalize(text: &str) -> String {
    text.to_lowercase().replace('ё', "е")
}

impl ProfanityFilter {
    pub fn from_lists(lists: &[&str]) -> Self {
        let mut filter = ProfanityFilter::default();
        for list in lists {
            for line in list.lines().map(str::trim) {
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                match line.strip_prefix('=') {
                    Some(word) => filter.exact.push(normalize(word)),
                    None => filter.fragments.push(normalize(line)),
                }
            }
        }
        filter
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_profanity(&self, text: &str) -> bool {
        let text = normalize(text);
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .any(|word| {
                self.exact.iter().any(|bad| bad == word)
                    || self.fragments.iter().any(|bad| word.contains(bad.as_str()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_are_loaded() {
        assert!(!PROFANITY.is_empty());
    }

    #[test]
    fn test_fragment_and_exact_matching() {
        let filter = ProfanityFilter::from_lists(&["# header\nпизд\n=бля\n"]);

        assert!(filter.contains_profanity("Распиздяй Иванов"));
        assert!(filter.contains_profanity("бля"));
        assert!(!filter.contains_profanity("Корабля"));
        assert!(!filter.contains_profanity("Анна Корабльева"));
    }

    #[test]
    fn test_yo_is_normalized() {
        let filter = ProfanityFilter::from_lists(&["=еж"]);
        assert!(filter.contains_profanity("Ёж"));
    }

    #[test]
    fn test_clean_names_pass() {
        assert!(!PROFANITY.contains_profanity("Мария Сергеевна Волкова"));
        assert!(!PROFANITY.contains_profanity("Alexander Dickens"));
        assert!(!PROFANITY.contains_profanity("Cassandra"));
    }
}
