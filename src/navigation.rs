//! Previous/next navigation between article pages.

use crate::content::NavEntry;

/// Where a navigation control leads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target<'a> {
    /// The site's home page. Used at either end of the index, and when the
    /// current article isn't in the index at all.
    Home,

    /// A neighboring article.
    Article(&'a NavEntry),
}

/// The previous and next targets for one article page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Navigation<'a> {
    pub previous: Target<'a>,
    pub next: Target<'a>,
}

/// Finds the first entry in `index` whose uid is `uid` and returns its
/// neighbors. There is no wraparound: the first entry has no previous article
/// and the last has no next one. An empty index, or a uid that isn't in it,
/// sends both directions home.
pub fn resolve<'a>(index: &'a [NavEntry], uid: &str) -> Navigation<'a> {
    let position = match index.iter().position(|entry| entry.uid == uid) {
        Some(position) => position,
        None => {
            return Navigation {
                previous: Target::Home,
                next: Target::Home,
            }
        }
    };

    Navigation {
        previous: match position.checked_sub(1) {
            Some(i) => Target::Article(&index[i]),
            None => Target::Home,
        },
        next: match index.get(position + 1) {
            Some(entry) => Target::Article(entry),
            None => Target::Home,
        },
    }
}
