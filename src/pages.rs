//! The three secret pages and the rules for what can be stored on them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const PAGE_COUNT: u8 = 3;
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// A page number in `1..=PAGE_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PageNumber(u8);

impl PageNumber {
    /// The page where friends see each other's messages.
    pub const SOCIAL: PageNumber = PageNumber(3);

    pub fn new(n: u8) -> Option<Self> {
        (1..=PAGE_COUNT).contains(&n).then_some(PageNumber(n))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = PageNumber> {
        (1..=PAGE_COUNT).map(PageNumber)
    }

    pub fn info(self) -> PageInfo {
        match self.0 {
            1 => PageInfo {
                title: "Secret Page 1",
                description: "View your secret message",
            },
            2 => PageInfo {
                title: "Secret Page 2",
                description: "Add and edit your secret message",
            },
            _ => PageInfo {
                title: "Secret Page 3",
                description: "Connect with friends and share secrets",
            },
        }
    }
}

impl TryFrom<u8> for PageNumber {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        PageNumber::new(n).ok_or_else(|| format!("page must be between 1 and {PAGE_COUNT}"))
    }
}

impl From<PageNumber> for u8 {
    fn from(page: PageNumber) -> u8 {
        page.0
    }
}

impl FromStr for PageNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: u8 = s
            .trim()
            .parse()
            .map_err(|_| format!("invalid page number: {s}"))?;
        PageNumber::try_from(n)
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dashboard card text for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("Please enter a message")]
    Empty,
    #[error("message is too long (max {MAX_MESSAGE_CHARS} characters)")]
    TooLong,
}

/// Accept a message for storage. Blank input is refused; the text is kept
/// exactly as submitted otherwise.
pub fn validate_message(message: &str) -> Result<(), MessageError> {
    if message.trim().is_empty() {
        return Err(MessageError::Empty);
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(MessageError::TooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_are_bounded() {
        assert!(PageNumber::new(0).is_none());
        assert_eq!(PageNumber::new(1).map(PageNumber::get), Some(1));
        assert_eq!(PageNumber::new(3), Some(PageNumber::SOCIAL));
        assert!(PageNumber::new(4).is_none());

        assert_eq!("2".parse::<PageNumber>().unwrap().get(), 2);
        assert!("9".parse::<PageNumber>().is_err());
        assert!("two".parse::<PageNumber>().is_err());
        assert_eq!(PageNumber::all().count(), PAGE_COUNT as usize);
    }

    #[test]
    fn page_number_serde() {
        let page: PageNumber = serde_json::from_str("2").unwrap();
        assert_eq!(page.get(), 2);
        assert_eq!(serde_json::to_string(&page).unwrap(), "2");
        assert!(serde_json::from_str::<PageNumber>("7").is_err());
    }

    #[test]
    fn page_catalogue() {
        assert_eq!(PageNumber::SOCIAL.info().title, "Secret Page 3");
        assert_eq!(
            PageNumber::new(2).unwrap().info().description,
            "Add and edit your secret message"
        );
    }

    #[test]
    fn message_validation() {
        assert_eq!(validate_message(""), Err(MessageError::Empty));
        assert_eq!(validate_message("   \n\t"), Err(MessageError::Empty));
        assert!(validate_message("  padded but real  ").is_ok());
        assert!(validate_message(&"é".repeat(MAX_MESSAGE_CHARS)).is_ok());
        assert_eq!(
            validate_message(&"a".repeat(MAX_MESSAGE_CHARS + 1)),
            Err(MessageError::TooLong)
        );
    }
}
