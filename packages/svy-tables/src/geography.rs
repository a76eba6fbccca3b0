// src/geography.rs
//! Geography keys derived from the PUMA column

use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Borough abbreviation by the first three characters of a clean PUMA code
const BOROUGH_BY_PUMA_PREFIX: [(&str, &str); 5] = [
    ("041", "MN"),
    ("042", "BX"),
    ("043", "BK"),
    ("044", "QN"),
    ("045", "SI"),
];

const PUMA_WIDTH: usize = 5;
const STATE_FIPS: &str = "36";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeographyLevel {
    Citywide,
    Borough,
    Puma,
}

impl GeographyLevel {
    pub const ALL: [GeographyLevel; 3] = [
        GeographyLevel::Citywide,
        GeographyLevel::Borough,
        GeographyLevel::Puma,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GeographyLevel::Citywide => "citywide",
            GeographyLevel::Borough => "borough",
            GeographyLevel::Puma => "puma",
        }
    }

    /// Key of a record at this level, or `None` when its PUMA is missing or
    /// outside the five boroughs.
    pub fn key_for(&self, raw_puma: Option<&str>) -> Option<String> {
        let puma = clean_puma(raw_puma?)?;
        let borough = borough_of(&puma)?;
        Some(match self {
            GeographyLevel::Citywide => "citywide".to_string(),
            GeographyLevel::Borough => borough.to_string(),
            GeographyLevel::Puma => puma,
        })
    }
}

impl fmt::Display for GeographyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn borough_of(puma: &str) -> Option<&'static str> {
    BOROUGH_BY_PUMA_PREFIX
        .iter()
        .find(|(prefix, _)| puma.starts_with(prefix))
        .map(|(_, boro)| *boro)
}

/// Normalize a PUMA code to five characters.
///
/// Accepts `4101`, `04101`, `3604101` and float renderings like `4101.0`.
pub fn clean_puma(raw: &str) -> Option<String> {
    let code = raw.trim().split('.').next()?.trim();
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let code = if code.len() == PUMA_WIDTH + STATE_FIPS.len() && code.starts_with(STATE_FIPS) {
        &code[STATE_FIPS.len()..]
    } else {
        code
    };
    if code.len() > PUMA_WIDTH {
        return None;
    }
    Some(format!("{:0>width$}", code, width = PUMA_WIDTH))
}

/// Sorted geography keys with a domain id per row.
///
/// Rows without a key get `u32::MAX` and drop out of every domain.
#[derive(Debug, Clone)]
pub struct GeographyIndex {
    pub level: GeographyLevel,
    pub keys: Vec<String>,
    pub ids: Vec<u32>,
}

impl GeographyIndex {
    pub fn build(level: GeographyLevel, pumas: &[Option<String>]) -> Self {
        let row_keys: Vec<Option<String>> = pumas
            .iter()
            .map(|p| level.key_for(p.as_deref()))
            .collect();

        let mut positions: BTreeMap<&str, u32> = BTreeMap::new();
        for key in row_keys.iter().flatten() {
            positions.entry(key.as_str()).or_insert(0);
        }
        for (idx, pos) in positions.values_mut().enumerate() {
            *pos = idx as u32;
        }

        let mut excluded = 0usize;
        let ids: Vec<u32> = row_keys
            .iter()
            .map(|k| match k {
                Some(k) => positions[k.as_str()],
                None => {
                    excluded += 1;
                    u32::MAX
                }
            })
            .collect();

        if excluded > 0 {
            warn!(
                geography = %level,
                excluded,
                "records without a recognizable geography were excluded"
            );
        }

        let keys = positions.keys().map(|k| k.to_string()).collect();
        Self { level, keys, ids }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
