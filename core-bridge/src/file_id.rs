//! Structured view of session file identifiers.
//!
//! Identifiers produced by the external client follow the layout
//! `<prefix>_<prefix>_<serviceId>_<accountId>_<objectTypeId>_D<YYYY><MM>...`,
//! for example `18_4_0_1_406_D201901_1`. A [`FileFilter`] matches the parsed
//! form to narrow `getSessionData` down to some services, accounts or periods.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileIdError {
    #[error("file id '{file_id}' is missing the {segment} segment")]
    MissingSegment {
        file_id: String,
        segment: &'static str,
    },

    #[error("file id '{file_id}' has an invalid {segment} segment: '{value}'")]
    InvalidSegment {
        file_id: String,
        segment: &'static str,
        value: String,
    },
}

/// Year and month a file's data belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FilePeriod {
    pub year: u16,
    pub month: u8,
}

impl fmt::Display for FilePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Parsed session file identifier.
///
/// ```
/// use core_bridge::FileDescriptor;
///
/// let descriptor: FileDescriptor = "18_4_0_1_406_D201901_1".parse().unwrap();
/// assert_eq!(descriptor.service_id, 0);
/// assert_eq!(descriptor.account_id, "1");
/// assert_eq!(descriptor.object_type_id, 406);
/// assert_eq!(descriptor.date.year, 2019);
/// assert_eq!(descriptor.date.month, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub file_id: String,
    pub service_id: u32,
    pub account_id: String,
    pub object_type_id: u32,
    pub date: FilePeriod,
}

impl FileDescriptor {
    pub fn parse(file_id: &str) -> Result<Self, FileIdError> {
        let mut segments = file_id.split('_').skip(2);
        let mut next = |segment: &'static str| {
            segments
                .next()
                .filter(|value| !value.is_empty())
                .ok_or_else(|| FileIdError::MissingSegment {
                    file_id: file_id.to_string(),
                    segment,
                })
        };

        let service_id = next("serviceId")?;
        let account_id = next("accountId")?;
        let object_type_id = next("objectTypeId")?;
        let date_range = next("date")?;

        let invalid = |segment: &'static str, value: &str| FileIdError::InvalidSegment {
            file_id: file_id.to_string(),
            segment,
            value: value.to_string(),
        };

        Ok(Self {
            file_id: file_id.to_string(),
            service_id: service_id
                .parse()
                .map_err(|_| invalid("serviceId", service_id))?,
            account_id: account_id.to_string(),
            object_type_id: object_type_id
                .parse()
                .map_err(|_| invalid("objectTypeId", object_type_id))?,
            date: parse_period(date_range).ok_or_else(|| invalid("date", date_range))?,
        })
    }
}

impl FromStr for FileDescriptor {
    type Err = FileIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Match lists over [`FileDescriptor`] fields.
///
/// An empty list matches every value. A file passes when each non-empty list
/// contains the corresponding field.
///
/// ```
/// use core_bridge::{FileDescriptor, FileFilter};
///
/// let filter = FileFilter::default().with_years([2019]).with_months([1, 2]);
/// let descriptor = FileDescriptor::parse("18_4_0_1_406_D201901_1").unwrap();
/// assert!(filter.matches(&descriptor));
/// assert!(!filter.matches(&FileDescriptor::parse("18_4_0_1_406_D201803_1").unwrap()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileFilter {
    pub service_ids: Vec<u32>,
    pub account_ids: Vec<String>,
    pub object_type_ids: Vec<u32>,
    pub years: Vec<u16>,
    pub months: Vec<u8>,
}

impl FileFilter {
    pub fn with_service_ids(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.service_ids = ids.into_iter().collect();
        self
    }

    pub fn with_account_ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.account_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_object_type_ids(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.object_type_ids = ids.into_iter().collect();
        self
    }

    pub fn with_years(mut self, years: impl IntoIterator<Item = u16>) -> Self {
        self.years = years.into_iter().collect();
        self
    }

    pub fn with_months(mut self, months: impl IntoIterator<Item = u8>) -> Self {
        self.months = months.into_iter().collect();
        self
    }

    /// True when no list is set and every file passes unparsed.
    pub fn is_empty(&self) -> bool {
        self.service_ids.is_empty()
            && self.account_ids.is_empty()
            && self.object_type_ids.is_empty()
            && self.years.is_empty()
            && self.months.is_empty()
    }

    pub fn matches(&self, descriptor: &FileDescriptor) -> bool {
        fn allows<T: PartialEq>(list: &[T], value: &T) -> bool {
            list.is_empty() || list.contains(value)
        }

        allows(&self.service_ids, &descriptor.service_id)
            && allows(&self.account_ids, &descriptor.account_id)
            && allows(&self.object_type_ids, &descriptor.object_type_id)
            && allows(&self.years, &descriptor.date.year)
            && allows(&self.months, &descriptor.date.month)
    }

    /// Checks a raw identifier against the filter.
    ///
    /// An empty filter accepts any identifier without parsing it.
    ///
    /// # Errors
    ///
    /// The parse error when the filter is set and `file_id` is malformed.
    pub fn accepts(&self, file_id: &str) -> Result<bool, FileIdError> {
        if self.is_empty() {
            return Ok(true);
        }
        Ok(self.matches(&FileDescriptor::parse(file_id)?))
    }
}

// `D` followed by four year digits and two month digits; anything after is
// ignored.
fn parse_period(segment: &str) -> Option<FilePeriod> {
    let digits = segment.strip_prefix('D')?;
    let year = digits.get(0..4)?;
    let month = digits.get(4..6)?;
    if !year.bytes().chain(month.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let month: u8 = month.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }

    Some(FilePeriod {
        year: year.parse().ok()?,
        month,
    })
}
