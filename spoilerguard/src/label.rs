//! Formatting of redacted titles.
//!
//! Labels are pure string transformations: they never decide whether an item
//! is a spoiler, only what a redacted item shows instead of its title.

use std::borrow::Cow;

/// Default text shown in place of a hidden title.
pub const HIDDEN_TITLE_PLACEHOLDER: &str = "Title hidden";

/// Default character used by [`LabelPolicy::Mask`].
pub const MASK_CHAR: char = '*';

/// Short code for an episode: `S01E03`, `Special 2`, or `Season 4` without an
/// episode number.
pub fn episode_code(season: u32, episode: Option<u32>) -> String {
    match (season, episode) {
        (0, Some(episode)) => format!("Special {episode}"),
        (0, None) => "Special".to_string(),
        (season, Some(episode)) => format!("S{season:02}E{episode:02}"),
        (season, None) => format!("Season {season}"),
    }
}

/// How a redacted title is rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelPolicy {
    /// Replace the title with a fixed placeholder.
    Placeholder {
        placeholder: Cow<'static, str>,
    },
    /// Episode code followed by a placeholder, e.g. `S01E03 - Title hidden`.
    /// Falls back to the bare placeholder without a season number.
    EpisodeCode {
        placeholder: Cow<'static, str>,
    },
    /// Mask every non-whitespace character, keeping the title's word shape.
    Mask { mask_char: char },
}

impl LabelPolicy {
    /// [`LabelPolicy::Placeholder`] using [`HIDDEN_TITLE_PLACEHOLDER`].
    #[must_use]
    pub fn placeholder() -> Self {
        Self::placeholder_with(HIDDEN_TITLE_PLACEHOLDER)
    }

    /// [`LabelPolicy::Placeholder`] using a custom (e.g. localized) placeholder.
    #[must_use]
    pub fn placeholder_with<P>(placeholder: P) -> Self
    where
        P: Into<Cow<'static, str>>,
    {
        Self::Placeholder {
            placeholder: placeholder.into(),
        }
    }

    /// [`LabelPolicy::EpisodeCode`] using [`HIDDEN_TITLE_PLACEHOLDER`].
    #[must_use]
    pub fn episode_code() -> Self {
        Self::EpisodeCode {
            placeholder: Cow::Borrowed(HIDDEN_TITLE_PLACEHOLDER),
        }
    }

    /// [`LabelPolicy::Mask`] using [`MASK_CHAR`].
    #[must_use]
    pub fn mask() -> Self {
        Self::Mask {
            mask_char: MASK_CHAR,
        }
    }

    /// Overrides the mask character. No effect on the placeholder policies.
    #[must_use]
    pub fn with_mask_char(mut self, mask_char: char) -> Self {
        if let Self::Mask { mask_char: current } = &mut self {
            *current = mask_char;
        }
        self
    }

    /// Renders the redacted form of `title`.
    ///
    /// Empty titles always render as the default placeholder.
    #[must_use]
    pub fn apply_to(&self, title: &str, season: Option<u32>, episode: Option<u32>) -> String {
        match self {
            Self::Placeholder { placeholder } => placeholder.clone().into_owned(),
            Self::EpisodeCode { placeholder } => match season {
                Some(season) => format!("{} - {placeholder}", episode_code(season, episode)),
                None => placeholder.clone().into_owned(),
            },
            Self::Mask { mask_char } => {
                if title.trim().is_empty() {
                    return HIDDEN_TITLE_PLACEHOLDER.to_string();
                }
                title
                    .chars()
                    .map(|ch| if ch.is_whitespace() { ch } else { *mask_char })
                    .collect()
            }
        }
    }
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self::episode_code()
    }
}
