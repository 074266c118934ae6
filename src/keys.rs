use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Road category, ordered by its versioned ordinal.
///
/// The ordinal mapping is part of the persisted key encoding; never renumber
/// an existing entry, only append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    European,
    National,
    County,
    Municipal,
    Private,
    Forest,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::European,
        Category::National,
        Category::County,
        Category::Municipal,
        Category::Private,
        Category::Forest,
    ];

    /// Stable codec ordinal.
    pub const fn ordinal(self) -> u8 {
        match self {
            Category::European => 0,
            Category::National => 1,
            Category::County => 2,
            Category::Municipal => 3,
            Category::Private => 4,
            Category::Forest => 5,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Category::European),
            1 => Some(Category::National),
            2 => Some(Category::County),
            3 => Some(Category::Municipal),
            4 => Some(Category::Private),
            5 => Some(Category::Forest),
            _ => None,
        }
    }

    /// Letter used in the canonical text form and query patterns.
    pub const fn letter(self) -> char {
        match self {
            Category::European => 'E',
            Category::National => 'R',
            Category::County => 'F',
            Category::Municipal => 'K',
            Category::Private => 'P',
            Category::Forest => 'S',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'E' => Some(Category::European),
            'R' => Some(Category::National),
            'F' => Some(Category::County),
            'K' => Some(Category::Municipal),
            'P' => Some(Category::Private),
            'S' => Some(Category::Forest),
            _ => None,
        }
    }

    /// External enum value code carried in classification properties.
    pub const fn value_code(self) -> u32 {
        match self {
            Category::European => 19024,
            Category::National => 19025,
            Category::County => 19026,
            Category::Municipal => 19027,
            Category::Private => 19028,
            Category::Forest => 19029,
        }
    }

    pub fn from_value_code(code: u32) -> Option<Self> {
        Category::ALL
            .into_iter()
            .find(|category| category.value_code() == code)
    }
}

impl Ord for Category {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal().cmp(&other.ordinal())
    }
}

impl PartialOrd for Category {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Road phase, ordered by its versioned ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Planned,
    Construction,
    Operational,
    Fictional,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Planned,
        Phase::Construction,
        Phase::Operational,
        Phase::Fictional,
    ];

    /// Stable codec ordinal.
    pub const fn ordinal(self) -> u8 {
        match self {
            Phase::Planned => 0,
            Phase::Construction => 1,
            Phase::Operational => 2,
            Phase::Fictional => 3,
        }
    }

    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Phase::Planned),
            1 => Some(Phase::Construction),
            2 => Some(Phase::Operational),
            3 => Some(Phase::Fictional),
            _ => None,
        }
    }

    /// Letter used in the canonical text form and query patterns.
    pub const fn letter(self) -> char {
        match self {
            Phase::Planned => 'P',
            Phase::Construction => 'A',
            Phase::Operational => 'V',
            Phase::Fictional => 'F',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'P' => Some(Phase::Planned),
            'A' => Some(Phase::Construction),
            'V' => Some(Phase::Operational),
            'F' => Some(Phase::Fictional),
            _ => None,
        }
    }

    /// External enum value code carried in classification properties.
    pub const fn value_code(self) -> u32 {
        match self {
            Phase::Planned => 19030,
            Phase::Construction => 19031,
            Phase::Operational => 19032,
            Phase::Fictional => 19090,
        }
    }

    pub fn from_value_code(code: u32) -> Option<Self> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.value_code() == code)
    }
}

impl Ord for Phase {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordinal().cmp(&other.ordinal())
    }
}

impl PartialOrd for Phase {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Hierarchical composite key a segment reference is indexed under.
///
/// Total order is lexicographic over (category, phase, number, section,
/// subsection), matching the byte order of the fixed-width encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionKey {
    pub category: Category,
    pub phase: Phase,
    pub number: u16,
    pub section: u16,
    pub subsection: u16,
}

impl SectionKey {
    pub fn new(category: Category, phase: Phase, number: u16, section: u16, subsection: u16) -> Self {
        Self {
            category,
            phase,
            number,
            section,
            subsection,
        }
    }
}

impl Ord for SectionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (
            self.category,
            self.phase,
            self.number,
            self.section,
            self.subsection,
        )
            .cmp(&(
                other.category,
                other.phase,
                other.number,
                other.section,
                other.subsection,
            ))
    }
}

impl PartialOrd for SectionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{} S{}D{}",
            self.category, self.phase, self.number, self.section, self.subsection
        )
    }
}

/// Key-space prefix: category, phase, and number are mandatory, the trailing
/// fields optional. A subsection without a section is not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialSectionKey {
    pub category: Category,
    pub phase: Phase,
    pub number: u16,
    pub section: Option<u16>,
    pub subsection: Option<u16>,
}

/// Half-open key range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    pub from: SectionKey,
    pub to: SectionKey,
}

impl PartialSectionKey {
    /// Converts the prefix into the half-open range containing exactly the
    /// keys sharing it. The right-most specified field is incremented with
    /// carry into the fields left of it, so prefix semantics hold at field
    /// maxima.
    pub fn to_range(&self) -> KeyRange {
        let from = SectionKey {
            category: self.category,
            phase: self.phase,
            number: self.number,
            section: self.section.unwrap_or(0),
            subsection: self.subsection.unwrap_or(0),
        };
        let mut to = from;
        if self.subsection.is_some() {
            increment_subsection(&mut to);
        } else if self.section.is_some() {
            increment_section(&mut to);
        } else {
            increment_number(&mut to);
        }
        KeyRange { from, to }
    }

    /// Prefix membership test (equivalent to the range produced above).
    pub fn matches(&self, key: &SectionKey) -> bool {
        key.category == self.category
            && key.phase == self.phase
            && key.number == self.number
            && self.section.map_or(true, |section| key.section == section)
            && self
                .subsection
                .map_or(true, |subsection| key.subsection == subsection)
    }
}

fn increment_subsection(key: &mut SectionKey) {
    match key.subsection.checked_add(1) {
        Some(next) => key.subsection = next,
        None => {
            key.subsection = 0;
            increment_section(key);
        }
    }
}

fn increment_section(key: &mut SectionKey) {
    key.subsection = 0;
    match key.section.checked_add(1) {
        Some(next) => key.section = next,
        None => {
            key.section = 0;
            increment_number(key);
        }
    }
}

fn increment_number(key: &mut SectionKey) {
    key.section = 0;
    key.subsection = 0;
    match key.number.checked_add(1) {
        Some(next) => key.number = next,
        None => {
            key.number = 0;
            increment_phase(key);
        }
    }
}

fn increment_phase(key: &mut SectionKey) {
    match Phase::from_ordinal(key.phase.ordinal() + 1) {
        Some(next) => key.phase = next,
        None => {
            key.phase = Phase::ALL[0];
            match Category::from_ordinal(key.category.ordinal() + 1) {
                Some(next) => key.category = next,
                None => {
                    // Already past the last representable key; saturate.
                    *key = SectionKey {
                        category: Category::Forest,
                        phase: Phase::Fictional,
                        number: u16::MAX,
                        section: u16::MAX,
                        subsection: u16::MAX,
                    };
                }
            }
        }
    }
}

/// Rejection raised while parsing a query pattern, naming the bad token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("unknown category letter '{0}' (expected one of E, R, F, K, P, S)")]
    UnknownCategory(String),
    #[error("unknown phase letter '{0}' (expected one of V, P, A, F)")]
    UnknownPhase(String),
    #[error("invalid road number '{0}'")]
    InvalidNumber(String),
    #[error("invalid section '{0}'")]
    InvalidSection(String),
    #[error("invalid subsection '{0}'")]
    InvalidSubsection(String),
    #[error("unrecognized key pattern '{0}' (expected forms: 'EV6', 'EV6 S3', 'EV6 S3D1', 'E V 6 3 1')")]
    Unrecognized(String),
}

/// Parses a flexible query pattern into a key-space prefix.
///
/// Accepted forms, in precedence order: space-separated five-field
/// (`"E V 6 3 1"`), full compact (`"EV6 S3D1"`), section (`"EV6 S3"`), and
/// bare (`"EV6"`). Category, phase, and number are always mandatory.
pub fn parse_flexible(input: &str) -> Result<PartialSectionKey, PatternError> {
    let normalized = input.trim().to_ascii_uppercase();
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    match tokens.as_slice() {
        [category, phase, number, section, subsection] => Ok(PartialSectionKey {
            category: parse_category(category)?,
            phase: parse_phase(phase)?,
            number: parse_number(number)?,
            section: Some(
                section
                    .parse()
                    .map_err(|_| PatternError::InvalidSection(section.to_string()))?,
            ),
            subsection: Some(
                subsection
                    .parse()
                    .map_err(|_| PatternError::InvalidSubsection(subsection.to_string()))?,
            ),
        }),
        [compact] => {
            let (category, phase, number) = parse_compact(compact, &normalized)?;
            Ok(PartialSectionKey {
                category,
                phase,
                number,
                section: None,
                subsection: None,
            })
        }
        [compact, trailer] => {
            let (category, phase, number) = parse_compact(compact, &normalized)?;
            let (section, subsection) = parse_trailer(trailer)?;
            Ok(PartialSectionKey {
                category,
                phase,
                number,
                section: Some(section),
                subsection,
            })
        }
        _ => Err(PatternError::Unrecognized(input.trim().to_string())),
    }
}

fn parse_category(token: &str) -> Result<Category, PatternError> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) => {
            Category::from_letter(letter).ok_or_else(|| PatternError::UnknownCategory(token.to_string()))
        }
        _ => Err(PatternError::UnknownCategory(token.to_string())),
    }
}

fn parse_phase(token: &str) -> Result<Phase, PatternError> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) => {
            Phase::from_letter(letter).ok_or_else(|| PatternError::UnknownPhase(token.to_string()))
        }
        _ => Err(PatternError::UnknownPhase(token.to_string())),
    }
}

fn parse_number(token: &str) -> Result<u16, PatternError> {
    token
        .parse()
        .map_err(|_| PatternError::InvalidNumber(token.to_string()))
}

/// Parses the `"<cat><phase><num>"` head token, e.g. `"EV6"`.
fn parse_compact(token: &str, whole: &str) -> Result<(Category, Phase, u16), PatternError> {
    let mut chars = token.chars();
    let category_letter = chars
        .next()
        .ok_or_else(|| PatternError::Unrecognized(whole.to_string()))?;
    let phase_letter = chars
        .next()
        .ok_or_else(|| PatternError::Unrecognized(whole.to_string()))?;
    let digits = chars.as_str();
    if digits.is_empty() || !phase_letter.is_ascii_alphabetic() {
        return Err(PatternError::Unrecognized(whole.to_string()));
    }
    let category = Category::from_letter(category_letter)
        .ok_or_else(|| PatternError::UnknownCategory(category_letter.to_string()))?;
    let phase = Phase::from_letter(phase_letter)
        .ok_or_else(|| PatternError::UnknownPhase(phase_letter.to_string()))?;
    let number = parse_number(digits)?;
    Ok((category, phase, number))
}

/// Parses the `"S<sec>"` or `"S<sec>D<sub>"` trailer token.
fn parse_trailer(token: &str) -> Result<(u16, Option<u16>), PatternError> {
    let body = token
        .strip_prefix('S')
        .ok_or_else(|| PatternError::InvalidSection(token.to_string()))?;
    match body.split_once('D') {
        Some((section, subsection)) => {
            let section = section
                .parse()
                .map_err(|_| PatternError::InvalidSection(token.to_string()))?;
            let subsection = subsection
                .parse()
                .map_err(|_| PatternError::InvalidSubsection(token.to_string()))?;
            Ok((section, Some(subsection)))
        }
        None => {
            let section = body
                .parse()
                .map_err(|_| PatternError::InvalidSection(token.to_string()))?;
            Ok((section, None))
        }
    }
}
