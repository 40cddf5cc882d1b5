//! Reading-time estimation for [`crate::content::ArticleDetail`] content.

use crate::content::Section;
use serde::Deserialize;

/// The assumed reading speed, in words per minute.
pub const WORDS_PER_MINUTE: u64 = 200;

/// The smallest estimate ever reported. Content with no words reads in zero
/// minutes unless this is raised.
pub const MINIMUM_MINUTES: u64 = 0;

/// Estimates reading time from word counts. Deserializable so projects can
/// override the defaults under the `reading` configuration key.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Estimator {
    pub words_per_minute: u64,
    pub minimum_minutes: u64,
}

impl Default for Estimator {
    fn default() -> Self {
        Estimator {
            words_per_minute: WORDS_PER_MINUTE,
            minimum_minutes: MINIMUM_MINUTES,
        }
    }
}

/// The word totals behind an estimate, and the estimate itself.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReadingTime {
    pub body_words: u64,
    pub heading_words: u64,
    pub minutes: u64,
}

impl Estimator {
    /// Sums the words of every section's heading and body (as plain text) and
    /// converts the total to minutes, rounding up.
    pub fn estimate(&self, sections: &[Section]) -> ReadingTime {
        let (body_words, heading_words) =
            sections.iter().fold((0, 0), |(body, heading), section| {
                (
                    body + count_words(&section.body.as_text()),
                    heading + count_words(&section.heading),
                )
            });
        ReadingTime {
            body_words,
            heading_words,
            minutes: self.minutes(body_words + heading_words),
        }
    }

    /// Converts a word count into minutes.
    pub fn minutes(&self, words: u64) -> u64 {
        // a zero speed would divide by zero; treat it as the default
        let wpm = match self.words_per_minute {
            0 => WORDS_PER_MINUTE,
            wpm => wpm,
        };
        let minutes = words / wpm + (words % wpm != 0) as u64;
        minutes.max(self.minimum_minutes)
    }
}

/// Counts whitespace-delimited tokens.
pub fn count_words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::richtext::{Block, RichText};

    fn section(heading: &str, body: &str) -> Section {
        Section {
            heading: heading.to_owned(),
            body: RichText::new(vec![Block::paragraph(body)]),
        }
    }

    #[test]
    fn test_count_words() {
        assert_eq!(0, count_words(""));
        assert_eq!(0, count_words("   \n\t "));
        assert_eq!(3, count_words("  one\ttwo\n three "));
    }

    #[test]
    fn test_estimate_small_article() {
        let time = Estimator::default().estimate(&[section("A B", "one two three four")]);
        assert_eq!(
            ReadingTime {
                body_words: 4,
                heading_words: 2,
                minutes: 1,
            },
            time
        );
    }

    #[test]
    fn test_estimate_rounds_up() {
        let estimator = Estimator::default();
        assert_eq!(1, estimator.minutes(200));
        assert_eq!(2, estimator.minutes(201));
        assert_eq!(2, estimator.minutes(400));
    }

    #[test]
    fn test_estimate_counts_every_body_block() {
        let body = RichText::new(vec![
            Block::paragraph("one two"),
            Block::paragraph("three four five"),
        ]);
        let time = Estimator::default().estimate(&[Section {
            heading: String::from("Heading"),
            body,
        }]);
        assert_eq!(5, time.body_words);
        assert_eq!(1, time.heading_words);
    }

    #[test]
    fn test_empty_content_reports_the_floor() {
        assert_eq!(0, Estimator::default().estimate(&[]).minutes);
        let floored = Estimator {
            minimum_minutes: 1,
            ..Estimator::default()
        };
        assert_eq!(1, floored.estimate(&[]).minutes);
    }

    #[test]
    fn test_estimate_is_order_independent() {
        let long = "word ".repeat(350);
        let a = section("First heading", &long);
        let b = section("Second", "some other words");
        let estimator = Estimator::default();
        assert_eq!(
            estimator.estimate(&[a.clone(), b.clone()]),
            estimator.estimate(&[b, a])
        );
        assert_eq!(
            estimator.estimate(&[section("x y", "alpha beta gamma")]),
            estimator.estimate(&[section("y x", "gamma alpha beta")])
        );
    }

    #[test]
    fn test_custom_speed() {
        let estimator = Estimator {
            words_per_minute: 2,
            minimum_minutes: 0,
        };
        assert_eq!(3, estimator.estimate(&[section("A B", "one two three four")]).minutes);
    }

    #[test]
    fn test_huge_speed() {
        let estimator = Estimator {
            words_per_minute: u64::MAX,
            minimum_minutes: 0,
        };
        assert_eq!(0, estimator.minutes(0));
        assert_eq!(1, estimator.minutes(7));
        assert_eq!(1, estimator.minutes(u64::MAX));
    }
}
