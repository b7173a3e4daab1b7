#[cfg(test)]
mod tests;

use std::borrow::Cow;

use fancy_regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

/// A noise pattern that does not compile or could delete nothing forever
#[derive(Debug, Error)]
#[error("Invalid noise pattern {pattern:?}: {message}")]
pub struct NoisePatternError {
    pub pattern: String,
    pub message: String,
}

/// Drop `leading` pages from the front and `trailing` pages from the back
///
/// When the margins would remove every page, each is clamped to
/// `(len - 1) / 2` so a non-empty document keeps at least one page.
#[inline]
pub fn filter_margins<T>(pages: Vec<T>, leading: usize, trailing: usize) -> Vec<T> {
    let total = pages.len();
    let (leading, trailing) = if leading.saturating_add(trailing) >= total {
        let clamp = total.saturating_sub(1) / 2;
        (leading.min(clamp), trailing.min(clamp))
    } else {
        (leading, trailing)
    };

    debug!(
        "Keeping pages {}..{} of {}",
        leading + 1,
        total - trailing,
        total
    );
    pages
        .into_iter()
        .skip(leading)
        .take(total - leading - trailing)
        .collect()
}

/// Deletes every match of a set of patterns until the text stops changing
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    patterns: Vec<Regex>,
}

impl NoiseFilter {
    #[inline]
    pub fn new(patterns: &[String]) -> Result<Self, NoisePatternError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let invalid = |message: String| NoisePatternError {
                    pattern: pattern.clone(),
                    message,
                };
                let regex = Regex::new(pattern).map_err(|e| invalid(e.to_string()))?;
                if regex.is_match("").map_err(|e| invalid(e.to_string()))? {
                    return Err(invalid("pattern matches the empty string".to_string()));
                }
                Ok(regex)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Remove noise; `clean(clean(x)) == clean(x)`
    #[inline]
    pub fn clean(&self, text: &str) -> String {
        let mut current = text.to_string();
        loop {
            let next = self.clean_once(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn clean_once(&self, text: &str) -> String {
        let mut current = text.to_string();
        for regex in &self.patterns {
            let replaced = match regex.try_replacen(&current, 0, "") {
                Ok(Cow::Owned(replaced)) => Some(replaced),
                Ok(Cow::Borrowed(_)) => None,
                Err(e) => {
                    warn!("Noise pattern {} failed, leaving text as is: {}", regex, e);
                    None
                }
            };
            if let Some(replaced) = replaced {
                current = replaced;
            }
        }
        current
    }
}

impl Default for NoiseFilter {
    #[inline]
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }
}
