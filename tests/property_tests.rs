/// Property-based tests using proptest
/// Tests invariants and properties that should hold for all inputs
use proptest::prelude::*;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use wholesale_crm::core::import::parse_currency;
use wholesale_crm::core::query::{total_pages, LeadQuery, LeadQueryParams};
use wholesale_crm::core::stats::EquityBand;
use wholesale_crm::core::validation::{
    is_valid_email, validate_lead_patch, validate_new_lead, LeadInput, LeadUpdateInput,
};

// Property: validation should never panic
proptest! {
    #[test]
    fn email_validation_never_panics(email in "\\PC*") {
        let _ = is_valid_email(&email);
    }

    #[test]
    fn simple_addresses_are_valid(
        local in "[a-z]{1,10}",
        domain in "[a-z]{1,10}",
        tld in "[a-z]{2,4}"
    ) {
        let email = format!("{}@{}.{}", local, domain, tld);
        prop_assert!(is_valid_email(&email));
    }

    #[test]
    fn create_validation_never_panics(
        name in proptest::option::of("\\PC*"),
        email in proptest::option::of("\\PC*"),
        estimate in proptest::option::of("\\PC*"),
        lead_type in proptest::option::of("\\PC*")
    ) {
        let input = LeadInput {
            name,
            email,
            lead_type,
            estimate: estimate.map(serde_json::Value::String),
            ..LeadInput::default()
        };
        let _ = validate_new_lead(input);
    }

    #[test]
    fn patch_validation_never_panics(
        status in proptest::option::of(proptest::option::of("\\PC*")),
        mao in proptest::option::of(proptest::option::of("\\PC*"))
    ) {
        let input = LeadUpdateInput {
            status,
            mao: mao.map(|v| v.map(serde_json::Value::String)),
            ..LeadUpdateInput::default()
        };
        let _ = validate_lead_patch(input);
    }
}

// Property: currency parsing
proptest! {
    #[test]
    fn currency_parsing_never_panics(raw in "\\PC*") {
        let _ = parse_currency(&raw);
    }

    #[test]
    fn formatted_amounts_parse_to_their_value(dollars in 0u64..10_000_000u64, cents in 0u8..100u8) {
        let mut grouped = String::new();
        let digits = dollars.to_string();
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        let raw = format!("${}.{:02}", grouped, cents);
        let expected = BigDecimal::from_str(&format!("{}.{:02}", dollars, cents)).unwrap();

        prop_assert_eq!(parse_currency(&raw), Some(expected));
    }
}

// Property: pagination math
proptest! {
    #[test]
    fn pages_cover_every_result(total in 0u64..100_000u64, limit in 1u64..500u64) {
        let pages = total_pages(total, limit);
        prop_assert!(pages * limit >= total);
        if pages > 0 {
            prop_assert!((pages - 1) * limit < total);
        } else {
            prop_assert_eq!(total, 0);
        }
    }

    #[test]
    fn page_windows_never_overlap(page in 1u64..1_000u64, limit in 1u64..200u64) {
        let query = |page: u64| {
            LeadQuery::from_params(LeadQueryParams {
                page: Some(page.to_string()),
                limit: Some(limit.to_string()),
                ..LeadQueryParams::default()
            })
            .unwrap()
            .window()
        };
        let current = query(page);
        let next = query(page + 1);
        prop_assert_eq!(current.take, limit);
        prop_assert_eq!(current.skip + current.take, next.skip);
    }

    #[test]
    fn equity_bands_are_ordered(a in -1_000i64..1_000i64, b in -1_000i64..1_000i64) {
        let rank = |band: EquityBand| match band {
            EquityBand::Low => 0,
            EquityBand::Mid => 1,
            EquityBand::High => 2,
            EquityBand::Neutral => unreachable!(),
        };
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let lo_band = EquityBand::classify(Some(&BigDecimal::from(lo)));
        let hi_band = EquityBand::classify(Some(&BigDecimal::from(hi)));
        prop_assert!(rank(lo_band) <= rank(hi_band));
    }
}
