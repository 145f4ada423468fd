//! Identity resolution for incoming chemical entries.
//!
//! Two lots of the same chemical from the same vendor can coexist with
//! different expiry dates. They are told apart by a single-letter
//! disambiguation suffix (`"Acetone - A"`) on the stored chemical name,
//! while the display name stays clean for end users. This module owns the
//! whole name algebra plus the classification of a candidate entry against
//! the existing record set.
//!
//! Everything here is pure: the caller fetches the matching records, the
//! resolver decides. Suffixes are recomputed from the record set on every
//! call - there is no counter state anywhere.

use chrono::NaiveDate;

use chemstock_core::MasterRecordId;

use crate::models::MasterRecord;

/// A candidate entry, reduced to the fields identity resolution cares about.
/// Vendor and unit equality are already guaranteed by the ledger query.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Submitted chemical name.
    pub name: &'a str,
    /// Submitted expiry date.
    pub expiry_date: NaiveDate,
}

/// How a candidate entry relates to the existing record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing matches; create a fresh record under the bare name.
    NoMatch,
    /// One record shares the identical expiry; merge into it.
    ExactMatch(MasterRecord),
    /// Some existing record expires earlier than the candidate. The
    /// candidate is the newer lot and takes the given suffixed name;
    /// existing records keep theirs.
    NewerLot {
        /// Suffixed name for the candidate's new record.
        name: String,
    },
    /// No existing record expires earlier than the candidate. The candidate
    /// becomes (or keeps) the bare name, and each listed record is renamed
    /// to its own fresh suffix.
    EarlierLot {
        /// `(record, new name)` pairs, suffixes strictly increasing.
        renames: Vec<(MasterRecordId, String)>,
    },
}

/// Strip a single-letter disambiguation suffix, if present.
///
/// `"Acetone - A"` becomes `"Acetone"`; names without a suffix come back
/// unchanged.
#[must_use]
pub fn base_name(name: &str) -> &str {
    match name.rsplit_once(" - ") {
        Some((stem, tail)) if is_suffix(tail) => stem,
        _ => name,
    }
}

/// The disambiguation suffix of a name, uppercased, if it carries one.
#[must_use]
pub fn suffix_of(name: &str) -> Option<char> {
    let (_, tail) = name.rsplit_once(" - ")?;
    if is_suffix(tail) {
        tail.chars().next().map(|c| c.to_ascii_uppercase())
    } else {
        None
    }
}

fn is_suffix(tail: &str) -> bool {
    let mut chars = tail.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(c), None) if c.is_ascii_alphabetic()
    )
}

/// Whether `name` is `base` itself or a suffix variant of it,
/// case-insensitively.
///
/// This is the matching rule behind the ledger's
/// `find_matching_masters` contract; both backends delegate to it.
#[must_use]
pub fn is_name_variant(base: &str, name: &str) -> bool {
    if name.eq_ignore_ascii_case(base) {
        return true;
    }
    suffix_of(name).is_some() && base_name(name).eq_ignore_ascii_case(base)
}

/// The next unused suffix for `base`, given the names already in the store.
///
/// Suffixes are handed out in letter order: one past the highest in use,
/// `'A'` when none is.
#[must_use]
pub fn next_suffix<'a>(base: &str, existing_names: impl IntoIterator<Item = &'a str>) -> char {
    existing_names
        .into_iter()
        .filter(|name| base_name(name).eq_ignore_ascii_case(base))
        .filter_map(suffix_of)
        .max()
        .map_or('A', |last| (last as u8 + 1) as char)
}

/// Classify a candidate against the records sharing its name, vendor and
/// unit.
///
/// `existing` must be exactly the set returned by the ledger's
/// `find_matching_masters` for the candidate.
#[must_use]
pub fn resolve(candidate: &Candidate<'_>, existing: &[MasterRecord]) -> Resolution {
    if existing.is_empty() {
        return Resolution::NoMatch;
    }

    if let Some(exact) = existing
        .iter()
        .find(|record| record.expiry_date == candidate.expiry_date)
    {
        return Resolution::ExactMatch(exact.clone());
    }

    let names: Vec<&str> = existing
        .iter()
        .map(|record| record.chemical_name.as_str())
        .collect();

    if existing
        .iter()
        .any(|record| record.expiry_date < candidate.expiry_date)
    {
        let suffix = next_suffix(candidate.name, names);
        return Resolution::NewerLot {
            name: format!("{} - {}", candidate.name, suffix),
        };
    }

    // The candidate expires first and claims the bare name. Existing records
    // still holding it are pushed to fresh suffixes, one each, in id order;
    // records already suffixed are left alone.
    let mut suffix = next_suffix(candidate.name, names);
    let mut targets: Vec<&MasterRecord> = existing
        .iter()
        .filter(|record| suffix_of(&record.chemical_name).is_none())
        .collect();
    targets.sort_by_key(|record| record.id);

    let renames = targets
        .into_iter()
        .map(|record| {
            let renamed = format!("{} - {}", candidate.name, suffix);
            suffix = (suffix as u8 + 1) as char;
            (record.id, renamed)
        })
        .collect();

    Resolution::EarlierLot { renames }
}
