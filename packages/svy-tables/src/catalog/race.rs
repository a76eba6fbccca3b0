// src/catalog/race.rs
//! Race/ethnicity groups: Hispanic of any race, then non-Hispanic by race alone

use super::{coded, Coded, CrosstabDefinition};
use crate::microdata::Record;

pub const RACE_GROUPS: &[&str] = &["anh", "bnh", "hsp", "onh", "wnh"];
pub const RACE_ATTRIBUTES: &[&str] = &["HISP", "RAC1P"];

pub const RACE_CROSSTAB: CrosstabDefinition = CrosstabDefinition {
    name: "race",
    categories: RACE_GROUPS,
    assign: race_assign,
    attributes: RACE_ATTRIBUTES,
};

const NOT_HISPANIC: &str = "Not Spanish/Hispanic/Latino";

pub fn is_hispanic(record: &Record<'_>) -> Option<bool> {
    Some(match coded(record, "HISP")? {
        Coded::Label(label) => label != NOT_HISPANIC,
        Coded::Code(code) => code != 1,
    })
}

pub fn race_assign(record: &Record<'_>) -> Option<&'static str> {
    if is_hispanic(record)? {
        return Some("hsp");
    }
    let group = match coded(record, "RAC1P")? {
        Coded::Label("White alone") | Coded::Code(1) => "wnh",
        Coded::Label("Black or African American alone") | Coded::Code(2) => "bnh",
        Coded::Label("Asian alone") | Coded::Code(6) => "anh",
        _ => "onh",
    };
    Some(group)
}
