// src/catalog/demographics.rs
//! Person-level demographic indicators

use super::race::{race_assign, RACE_ATTRIBUTES, RACE_CROSSTAB, RACE_GROUPS};
use super::{age, coded, Coded, DenominatorFilter, IndicatorDefinition, StatisticKind, Universe};
use crate::microdata::Record;

pub static DEMOGRAPHICS: [IndicatorDefinition; 7] = [
    IndicatorDefinition {
        name: "total_pop",
        universe: Universe::Person,
        statistic: StatisticKind::Count,
        categories: &["total_pop"],
        assign: total_pop_assign,
        denominator: None,
        crosstab: Some(RACE_CROSSTAB),
        attributes: &[],
    },
    IndicatorDefinition {
        name: "age_p5pl",
        universe: Universe::Person,
        statistic: StatisticKind::Count,
        categories: &["age_p5pl"],
        assign: over_five_assign,
        denominator: Some(OVER_FIVE),
        crosstab: Some(RACE_CROSSTAB),
        attributes: &["AGEP"],
    },
    IndicatorDefinition {
        name: "race",
        universe: Universe::Person,
        statistic: StatisticKind::Count,
        categories: RACE_GROUPS,
        assign: race_assign,
        denominator: None,
        crosstab: None,
        attributes: RACE_ATTRIBUTES,
    },
    IndicatorDefinition {
        name: "age_bucket",
        universe: Universe::Person,
        statistic: StatisticKind::Count,
        categories: &["age_popu16", "age_p16t64", "age_p65pl"],
        assign: age_bucket_assign,
        denominator: None,
        crosstab: Some(RACE_CROSSTAB),
        attributes: &["AGEP"],
    },
    IndicatorDefinition {
        name: "lep",
        universe: Universe::Person,
        statistic: StatisticKind::Count,
        categories: &["lep", "english_proficient"],
        assign: lep_assign,
        denominator: Some(OVER_FIVE),
        crosstab: Some(RACE_CROSSTAB),
        attributes: &["AGEP", "ENG"],
    },
    IndicatorDefinition {
        name: "foreign_born",
        universe: Universe::Person,
        statistic: StatisticKind::Count,
        categories: &["fb", "native_born"],
        assign: foreign_born_assign,
        denominator: None,
        crosstab: Some(RACE_CROSSTAB),
        attributes: &["NATIVITY"],
    },
    IndicatorDefinition {
        name: "age_median",
        universe: Universe::Person,
        statistic: StatisticKind::Median { value: age },
        categories: &["age_median"],
        assign: age_median_assign,
        denominator: None,
        crosstab: Some(RACE_CROSSTAB),
        attributes: &["AGEP"],
    },
];

const OVER_FIVE: DenominatorFilter = DenominatorFilter {
    name: "over_five",
    keep: over_five,
};

fn total_pop_assign(_: &Record<'_>) -> Option<&'static str> {
    Some("total_pop")
}

fn over_five_assign(_: &Record<'_>) -> Option<&'static str> {
    Some("age_p5pl")
}

fn age_median_assign(_: &Record<'_>) -> Option<&'static str> {
    Some("age_median")
}

pub fn age_bucket_assign(record: &Record<'_>) -> Option<&'static str> {
    let age = age(record)?;
    Some(if age < 16.0 {
        "age_popu16"
    } else if age < 65.0 {
        "age_p16t64"
    } else {
        "age_p65pl"
    })
}

fn over_five(record: &Record<'_>) -> bool {
    age(record).is_some_and(|a| a >= 5.0)
}

/// Speaks English less than "very well". No answer means English only.
pub fn lep_assign(record: &Record<'_>) -> Option<&'static str> {
    let limited = match coded(record, "ENG") {
        Some(Coded::Label(label)) => matches!(label, "Well" | "Not well" | "Not at all"),
        Some(Coded::Code(code)) => (2..=4).contains(&code),
        None => false,
    };
    Some(if limited { "lep" } else { "english_proficient" })
}

pub fn foreign_born_assign(record: &Record<'_>) -> Option<&'static str> {
    match coded(record, "NATIVITY")? {
        Coded::Label("Native") | Coded::Code(1) => Some("native_born"),
        Coded::Label(_) | Coded::Code(_) => Some("fb"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::microdata::tests::config_with_reps;
    use crate::microdata::MicrodataTable;
    use polars::prelude::*;

    fn table() -> MicrodataTable {
        let frame = df!(
            "PUMA" => [4101i64, 4101, 4101, 4101, 4101],
            "AGEP" => [3i64, 15, 16, 64, 65],
            "ENG" => [None, Some("Very well"), Some("Well"), None, Some("Not at all")],
            "NATIVITY" => [
                Some("Native"),
                Some("Foreign born"),
                None,
                Some("Native"),
                Some("Foreign born"),
            ],
            "PWGTP" => [1.0; 5],
            "PWGTP1" => [1.0; 5],
        )
        .unwrap();
        MicrodataTable::from_frame(&frame, Universe::Person, &config_with_reps(1)).unwrap()
    }

    #[test]
    fn test_age_buckets() {
        let t = table();
        let buckets: Vec<_> = t.records().map(|r| age_bucket_assign(&r)).collect();
        assert_eq!(
            buckets,
            vec![
                Some("age_popu16"),
                Some("age_popu16"),
                Some("age_p16t64"),
                Some("age_p16t64"),
                Some("age_p65pl"),
            ]
        );
    }

    #[test]
    fn test_lep_and_denominator() {
        let t = table();
        let lep: Vec<_> = t.records().map(|r| lep_assign(&r)).collect();
        assert_eq!(lep[1], Some("english_proficient"));
        assert_eq!(lep[2], Some("lep"));
        assert_eq!(lep[3], Some("english_proficient"));
        assert_eq!(lep[4], Some("lep"));

        let lep = DEMOGRAPHICS.iter().find(|d| d.name == "lep").unwrap();
        let eligible: Vec<_> = t.records().map(|r| lep.is_eligible(&r)).collect();
        assert_eq!(eligible, vec![false, true, true, true, true]);

        let p5pl = DEMOGRAPHICS.iter().find(|d| d.name == "age_p5pl").unwrap();
        let counted: Vec<_> = t.records().map(|r| p5pl.is_eligible(&r)).collect();
        assert_eq!(counted, eligible);
    }

    #[test]
    fn test_foreign_born() {
        let t = table();
        let fb: Vec<_> = t.records().map(|r| foreign_born_assign(&r)).collect();
        assert_eq!(
            fb,
            vec![Some("native_born"), Some("fb"), None, Some("native_born"), Some("fb")]
        );
    }
}
