// src/catalog/economics.rs
//! Labor force, occupation, industry, education and household income indicators

use super::race::RACE_CROSSTAB;
use super::{age, coded, Coded, DenominatorFilter, IndicatorDefinition, StatisticKind, Universe};
use crate::microdata::Record;

pub const OCCUPATION_CATEGORIES: &[&str] = &[
    "occupation_mbsa",
    "occupation_srvc",
    "occupation_slsoff",
    "occupation_cstmnt",
    "occupation_prdtrn",
];

pub const INDUSTRY_CATEGORIES: &[&str] = &[
    "industry_agff",
    "industry_cnstn",
    "industry_mnfct",
    "industry_whlsl",
    "industry_rtl",
    "industry_trwhu",
    "industry_info",
    "industry_fire",
    "industry_pfmg",
    "industry_edhlt",
    "industry_arten",
    "industry_oth",
    "industry_pbadm",
];

pub const INDUSTRY_WAGE_CATEGORIES: &[&str] = &[
    "industry_agff_wages",
    "industry_cnstn_wages",
    "industry_mnfct_wages",
    "industry_whlsl_wages",
    "industry_rtl_wages",
    "industry_trwhu_wages",
    "industry_info_wages",
    "industry_fire_wages",
    "industry_pfmg_wages",
    "industry_edhlt_wages",
    "industry_arten_wages",
    "industry_oth_wages",
    "industry_pbadm_wages",
];

pub const EDUCATION_CATEGORIES: &[&str] = &["edu_lths", "edu_hs", "edu_smcol", "edu_bchpl"];

pub const INCOME_BAND_CATEGORIES: &[&str] = &[
    "households_eli",
    "households_vli",
    "households_li",
    "households_mi",
    "households_midi",
    "households_hi",
];

const CIVILIAN_EMPLOYED: DenominatorFilter = DenominatorFilter {
    name: "civilian_employed",
    keep: civilian_employed,
};

const NON_GROUP_QUARTERS: DenominatorFilter = DenominatorFilter {
    name: "non_group_quarters",
    keep: non_group_quarters,
};

pub static ECONOMICS: [IndicatorDefinition; 7] = [
    IndicatorDefinition {
        name: "lf",
        universe: Universe::Person,
        statistic: StatisticKind::Count,
        categories: &["lf", "not_in_lf"],
        assign: lf_assign,
        denominator: Some(DenominatorFilter {
            name: "over_fifteen",
            keep: over_fifteen,
        }),
        crosstab: Some(RACE_CROSSTAB),
        attributes: &["AGEP", "ESR"],
    },
    IndicatorDefinition {
        name: "occupation",
        universe: Universe::Person,
        statistic: StatisticKind::Count,
        categories: OCCUPATION_CATEGORIES,
        assign: occupation_assign,
        denominator: Some(CIVILIAN_EMPLOYED),
        crosstab: Some(RACE_CROSSTAB),
        attributes: &["AGEP", "ESR", "OCCP"],
    },
    IndicatorDefinition {
        name: "industry",
        universe: Universe::Person,
        statistic: StatisticKind::Count,
        categories: INDUSTRY_CATEGORIES,
        assign: industry_assign,
        denominator: Some(CIVILIAN_EMPLOYED),
        crosstab: Some(RACE_CROSSTAB),
        attributes: &["AGEP", "ESR", "INDP"],
    },
    IndicatorDefinition {
        name: "education",
        universe: Universe::Person,
        statistic: StatisticKind::Count,
        categories: EDUCATION_CATEGORIES,
        assign: education_assign,
        denominator: Some(DenominatorFilter {
            name: "over_twenty_four",
            keep: over_twenty_four,
        }),
        crosstab: Some(RACE_CROSSTAB),
        attributes: &["AGEP", "SCHL"],
    },
    IndicatorDefinition {
        name: "household_income_bands",
        universe: Universe::Household,
        statistic: StatisticKind::Count,
        categories: INCOME_BAND_CATEGORIES,
        assign: income_band_assign,
        denominator: Some(NON_GROUP_QUARTERS),
        crosstab: None,
        attributes: &["HINCP", "NPF", "HHT"],
    },
    IndicatorDefinition {
        name: "wages_by_industry",
        universe: Universe::Person,
        statistic: StatisticKind::Median { value: wages },
        categories: INDUSTRY_WAGE_CATEGORIES,
        assign: industry_wages_assign,
        denominator: Some(DenominatorFilter {
            name: "civilian_employed_with_earnings",
            keep: civilian_employed_with_earnings,
        }),
        crosstab: Some(RACE_CROSSTAB),
        attributes: &["AGEP", "ESR", "INDP", "WAGP"],
    },
    IndicatorDefinition {
        name: "household_income_median",
        universe: Universe::Household,
        statistic: StatisticKind::Median {
            value: household_income,
        },
        categories: &["household_income"],
        assign: household_income_assign,
        denominator: Some(NON_GROUP_QUARTERS),
        crosstab: None,
        attributes: &["HINCP", "HHT"],
    },
];

// ============================================================================
// Filters
// ============================================================================

fn over_fifteen(record: &Record<'_>) -> bool {
    age(record).is_some_and(|a| a >= 16.0)
}

fn over_twenty_four(record: &Record<'_>) -> bool {
    age(record).is_some_and(|a| a > 24.0)
}

/// Civilians aged 16 to 64 with a job
pub fn civilian_employed(record: &Record<'_>) -> bool {
    let working_age = age(record).is_some_and(|a| (16.0..=64.0).contains(&a));
    let employed = match coded(record, "ESR") {
        Some(Coded::Label(label)) => matches!(
            label,
            "Civilian employed, at work" | "Civilian employed, with a job but not at work"
        ),
        Some(Coded::Code(code)) => code == 1 || code == 2,
        None => false,
    };
    working_age && employed
}

fn civilian_employed_with_earnings(record: &Record<'_>) -> bool {
    civilian_employed(record) && wages(record).is_some_and(|w| w > 0.0)
}

pub fn non_group_quarters(record: &Record<'_>) -> bool {
    match coded(record, "HHT") {
        Some(Coded::Label(label)) => label != "N/A (GQ/vacant)",
        Some(Coded::Code(_)) => true,
        None => false,
    }
}

// ============================================================================
// Assignment
// ============================================================================

pub fn lf_assign(record: &Record<'_>) -> Option<&'static str> {
    match coded(record, "ESR")? {
        Coded::Label("Not in labor force") | Coded::Code(6) => Some("not_in_lf"),
        Coded::Label(label) if label.starts_with("N/A") => None,
        Coded::Code(code) if !(1..=5).contains(&code) => None,
        _ => Some("lf"),
    }
}

/// Occupation group from the 2018 OCCP code or its labelled prefix
fn occupation_group(record: &Record<'_>) -> Option<usize> {
    match coded(record, "OCCP")? {
        Coded::Code(code) => match code {
            10..=3550 => Some(0),
            3601..=4655 => Some(1),
            4700..=5940 => Some(2),
            6005..=7640 => Some(3),
            7700..=9760 => Some(4),
            _ => None,
        },
        Coded::Label(label) => match label.get(..3)? {
            "MGR" | "BUS" | "FIN" | "CMM" | "ENG" | "SCI" | "CMS" | "LGL" | "EDU" | "ENT"
            | "MED" => Some(0),
            "HLS" | "PRT" | "EAT" | "CLN" | "PRS" => Some(1),
            "SAL" | "OFF" => Some(2),
            "FFF" | "CON" | "EXT" | "RPR" => Some(3),
            "PRD" | "TRN" => Some(4),
            _ => None,
        },
    }
}

/// Industry sector from the 2018 INDP code or its labelled prefix
fn industry_sector(record: &Record<'_>) -> Option<usize> {
    match coded(record, "INDP")? {
        Coded::Code(code) => match code {
            170..=490 => Some(0),
            770 => Some(1),
            1070..=3990 => Some(2),
            4070..=4590 => Some(3),
            4670..=5790 => Some(4),
            570..=690 | 6070..=6390 => Some(5),
            6470..=6780 => Some(6),
            6870..=7190 => Some(7),
            7270..=7790 => Some(8),
            7860..=8470 => Some(9),
            8561..=8690 => Some(10),
            8770..=9290 => Some(11),
            9370..=9590 => Some(12),
            _ => None,
        },
        Coded::Label(label) => match label.get(..3)? {
            "AGR" | "EXT" => Some(0),
            "CON" => Some(1),
            "MFG" => Some(2),
            "WHL" => Some(3),
            "RET" => Some(4),
            "TRN" | "UTL" => Some(5),
            "INF" => Some(6),
            "FIN" => Some(7),
            "PRF" => Some(8),
            "EDU" | "MED" | "SCA" => Some(9),
            "ENT" => Some(10),
            "SRV" => Some(11),
            "ADM" => Some(12),
            _ => None,
        },
    }
}

pub fn occupation_assign(record: &Record<'_>) -> Option<&'static str> {
    occupation_group(record).map(|i| OCCUPATION_CATEGORIES[i])
}

pub fn industry_assign(record: &Record<'_>) -> Option<&'static str> {
    industry_sector(record).map(|i| INDUSTRY_CATEGORIES[i])
}

fn industry_wages_assign(record: &Record<'_>) -> Option<&'static str> {
    industry_sector(record).map(|i| INDUSTRY_WAGE_CATEGORIES[i])
}

pub fn education_assign(record: &Record<'_>) -> Option<&'static str> {
    let level = match coded(record, "SCHL")? {
        Coded::Label(
            "Bachelor's degree"
            | "Master's degree"
            | "Professional degree beyond a bachelor's degree"
            | "Doctorate degree",
        )
        | Coded::Code(21..=24) => 3,
        Coded::Label(
            "Some college, but less than 1 year"
            | "1 or more years of college credit, no degree"
            | "Associate's degree",
        )
        | Coded::Code(18..=20) => 2,
        Coded::Label("Regular high school diploma" | "GED or alternative credential")
        | Coded::Code(16..=17) => 1,
        _ => 0,
    };
    Some(EDUCATION_CATEGORIES[level])
}

/// Upper bounds of the ELI, VLI, LI, MI and MIDI bands by family size 1..=8.
const INCOME_BAND_CUTOFFS: [[f64; 5]; 8] = [
    [20900.0, 34835.0, 55735.0, 83602.0, 114952.0],
    [23904.0, 39840.0, 63744.0, 95616.0, 131473.0],
    [26876.0, 44794.0, 71671.0, 107506.0, 147821.0],
    [29849.0, 49748.0, 79597.0, 119395.0, 164169.0],
    [32258.0, 53763.0, 86021.0, 129032.0, 177419.0],
    [34636.0, 57727.0, 92362.0, 138544.0, 190498.0],
    [37014.0, 61690.0, 98703.0, 148055.0, 203576.0],
    [39423.0, 65705.0, 105128.0, 157692.0, 216826.0],
];

/// Income band relative to the family-size cutoffs; families above 8 use the 8-person row.
pub fn income_band_assign(record: &Record<'_>) -> Option<&'static str> {
    let income = household_income(record)?;
    let family_size = record.num("NPF")?;
    if family_size < 1.0 {
        return None;
    }
    let row = &INCOME_BAND_CUTOFFS[(family_size as usize).min(8) - 1];
    let band = row.iter().filter(|&&cutoff| income >= cutoff).count();
    Some(INCOME_BAND_CATEGORIES[band])
}

fn household_income_assign(_: &Record<'_>) -> Option<&'static str> {
    Some("household_income")
}

fn wages(record: &Record<'_>) -> Option<f64> {
    record.num("WAGP")
}

fn household_income(record: &Record<'_>) -> Option<f64> {
    record.num("HINCP")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::microdata::tests::config_with_reps;
    use crate::microdata::MicrodataTable;
    use polars::prelude::*;

    fn person_table() -> MicrodataTable {
        let frame = df!(
            "PUMA" => [4101i64, 4101, 4101, 4101, 4101],
            "AGEP" => [30i64, 70, 45, 15, 40],
            "ESR" => [
                Some("Civilian employed, at work"),
                Some("Civilian employed, at work"),
                Some("Not in labor force"),
                Some("N/A (less than 16 years old)"),
                Some("Armed forces, at work"),
            ],
            "OCCP" => [430i64, 4720, 9800, 0, 2310],
            "INDP" => [770i64, 6870, 9870, 0, 570],
            "SCHL" => [
                Some("Master's degree"),
                Some("GED or alternative credential"),
                Some("Associate's degree"),
                None,
                Some("Grade 10"),
            ],
            "WAGP" => [52000.0, 0.0, 0.0, 0.0, 30000.0],
            "PWGTP" => [1.0; 5],
            "PWGTP1" => [1.0; 5],
        )
        .unwrap();
        MicrodataTable::from_frame(&frame, Universe::Person, &config_with_reps(1)).unwrap()
    }

    #[test]
    fn test_labor_force() {
        let t = person_table();
        let lf: Vec<_> = t.records().map(|r| lf_assign(&r)).collect();
        assert_eq!(lf, vec![Some("lf"), Some("lf"), Some("not_in_lf"), None, Some("lf")]);
    }

    #[test]
    fn test_civilian_employed_filters() {
        let t = person_table();
        let employed: Vec<_> = t.records().map(|r| civilian_employed(&r)).collect();
        // Second record is over 64, last is in the armed forces
        assert_eq!(employed, vec![true, false, false, false, false]);
        assert!(civilian_employed_with_earnings(&t.record(0)));
    }

    #[test]
    fn test_occupation_and_industry_codes() {
        let t = person_table();
        assert_eq!(occupation_assign(&t.record(0)), Some("occupation_mbsa"));
        assert_eq!(occupation_assign(&t.record(1)), Some("occupation_slsoff"));
        assert_eq!(occupation_assign(&t.record(2)), None);
        assert_eq!(industry_assign(&t.record(0)), Some("industry_cnstn"));
        assert_eq!(industry_assign(&t.record(1)), Some("industry_fire"));
        assert_eq!(industry_assign(&t.record(2)), None);
        assert_eq!(industry_assign(&t.record(4)), Some("industry_trwhu"));
        assert_eq!(industry_wages_assign(&t.record(0)), Some("industry_cnstn_wages"));
    }

    #[test]
    fn test_education_levels() {
        let t = person_table();
        let edu: Vec<_> = t.records().map(|r| education_assign(&r)).collect();
        assert_eq!(
            edu,
            vec![
                Some("edu_bchpl"),
                Some("edu_hs"),
                Some("edu_smcol"),
                None,
                Some("edu_lths"),
            ]
        );
    }

    #[test]
    fn test_labelled_occupation_prefixes() {
        let frame = df!(
            "PUMA" => [4101i64, 4101],
            "OCCP" => ["EAT-Cooks", "MIL-Military Enlisted"],
            "INDP" => ["MED-General Medical And Surgical Hospitals", "ADM-Justice"],
            "PWGTP" => [1.0, 1.0],
            "PWGTP1" => [1.0, 1.0],
        )
        .unwrap();
        let t = MicrodataTable::from_frame(&frame, Universe::Person, &config_with_reps(1)).unwrap();
        assert_eq!(occupation_assign(&t.record(0)), Some("occupation_srvc"));
        assert_eq!(occupation_assign(&t.record(1)), None);
        assert_eq!(industry_assign(&t.record(0)), Some("industry_edhlt"));
        assert_eq!(industry_assign(&t.record(1)), Some("industry_pbadm"));
    }

    #[test]
    fn test_income_bands() {
        let frame = df!(
            "PUMA" => [4101i64, 4101, 4101, 4101, 4101],
            "HINCP" => [20899.0, 20900.0, 250000.0, 39000.0, 50000.0],
            "NPF" => [1i64, 1, 1, 12, 2],
            "HHT" => [
                Some("Married couple household"),
                Some("Married couple household"),
                Some("N/A (GQ/vacant)"),
                Some("Married couple household"),
                None,
            ],
            "WGTP" => [1.0; 5],
            "WGTP1" => [1.0; 5],
        )
        .unwrap();
        let config = config_with_reps(1);
        let t = MicrodataTable::from_frame(&frame, Universe::Household, &config).unwrap();
        let bands: Vec<_> = t.records().map(|r| income_band_assign(&r)).collect();
        assert_eq!(
            bands,
            vec![
                Some("households_eli"),
                Some("households_vli"),
                Some("households_hi"),
                Some("households_eli"),
                Some("households_li"),
            ]
        );
        let kept: Vec<_> = t.records().map(|r| non_group_quarters(&r)).collect();
        assert_eq!(kept, vec![true, true, false, true, false]);
    }
}
