use crate::config::FilterConfig;
use regex::Regex;

/// Decides whether a thread title qualifies for harvesting
pub trait TitlePredicate {
    fn accepts(&self, title: &str) -> bool;
}

impl<F> TitlePredicate for F
where
    F: Fn(&str) -> bool,
{
    fn accepts(&self, title: &str) -> bool {
        self(title)
    }
}

/// Regex title filter: one inclusion pattern plus any number of exclusions
///
/// A title qualifies when it matches none of the exclusions and matches the
/// primary pattern. Exclusions are checked first.
///
/// # Examples
///
/// ```
/// use thread_harvest::filter::{PatternFilter, TitlePredicate};
///
/// let filter = PatternFilter::new(
///     r"(?i)\bgame thread\b",
///     &[r"(?i)\bpost[- ]?game\b".to_string()],
/// )
/// .unwrap();
///
/// assert!(filter.accepts("GAME THREAD: Canadiens vs Leafs"));
/// assert!(!filter.accepts("Post Game Thread: Canadiens vs Leafs"));
/// assert!(!filter.accepts("Trade rumours"));
/// ```
#[derive(Debug, Clone)]
pub struct PatternFilter {
    primary: Regex,
    exclude: Vec<Regex>,
}

impl PatternFilter {
    pub fn new(primary: &str, exclude: &[String]) -> Result<Self, regex::Error> {
        Ok(Self {
            primary: Regex::new(primary)?,
            exclude: exclude
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn from_config(config: &FilterConfig) -> Result<Self, regex::Error> {
        Self::new(&config.primary, &config.exclude)
    }
}

impl TitlePredicate for PatternFilter {
    fn accepts(&self, title: &str) -> bool {
        if self.exclude.iter().any(|re| re.is_match(title)) {
            return false;
        }
        self.primary.is_match(title)
    }
}
