use roadref::{parse_flexible, Category, PartialSectionKey, PatternError, Phase, SectionKey};

fn key(number: u16, section: u16, subsection: u16) -> SectionKey {
    SectionKey::new(
        Category::European,
        Phase::Operational,
        number,
        section,
        subsection,
    )
}

#[test]
fn ordinals_are_stable() {
    assert_eq!(Category::European.ordinal(), 0);
    assert_eq!(Category::Forest.ordinal(), 5);
    assert_eq!(Phase::Planned.ordinal(), 0);
    assert_eq!(Phase::Fictional.ordinal(), 3);
    for category in Category::ALL {
        assert_eq!(Category::from_ordinal(category.ordinal()), Some(category));
    }
    for phase in Phase::ALL {
        assert_eq!(Phase::from_ordinal(phase.ordinal()), Some(phase));
    }
    assert_eq!(Category::from_ordinal(6), None);
    assert_eq!(Phase::from_ordinal(4), None);
}

#[test]
fn value_codes_round_trip() {
    assert_eq!(Category::from_value_code(19024), Some(Category::European));
    assert_eq!(Category::from_value_code(19029), Some(Category::Forest));
    assert_eq!(Category::from_value_code(19030), None);
    assert_eq!(Phase::from_value_code(19032), Some(Phase::Operational));
    assert_eq!(Phase::from_value_code(19090), Some(Phase::Fictional));
    assert_eq!(Phase::from_value_code(19024), None);
}

#[test]
fn canonical_text_form() {
    let key = SectionKey::new(Category::European, Phase::Operational, 6, 1, 1);
    assert_eq!(key.to_string(), "EV6 S1D1");
    let key = SectionKey::new(Category::County, Phase::Planned, 714, 12, 3);
    assert_eq!(key.to_string(), "FP714 S12D3");
}

#[test]
fn order_is_lexicographic_over_fields() {
    let mut keys = vec![
        key(6, 1, 2),
        SectionKey::new(Category::National, Phase::Planned, 1, 1, 1),
        key(6, 2, 0),
        key(6, 1, 1),
        SectionKey::new(Category::European, Phase::Fictional, 0, 0, 0),
        key(5, 9, 9),
    ];
    keys.sort();
    assert_eq!(
        keys,
        vec![
            key(5, 9, 9),
            key(6, 1, 1),
            key(6, 1, 2),
            key(6, 2, 0),
            SectionKey::new(Category::European, Phase::Fictional, 0, 0, 0),
            SectionKey::new(Category::National, Phase::Planned, 1, 1, 1),
        ]
    );
}

#[test]
fn parses_space_separated_form() {
    let prefix = parse_flexible("E V 6 3 1").expect("five-field form parses");
    assert_eq!(
        prefix,
        PartialSectionKey {
            category: Category::European,
            phase: Phase::Operational,
            number: 6,
            section: Some(3),
            subsection: Some(1),
        }
    );
}

#[test]
fn parses_compact_forms() {
    let bare = parse_flexible("EV6").expect("bare form parses");
    assert_eq!(bare.number, 6);
    assert_eq!(bare.section, None);
    assert_eq!(bare.subsection, None);

    let section = parse_flexible("EV6 S3").expect("section form parses");
    assert_eq!(section.section, Some(3));
    assert_eq!(section.subsection, None);

    let full = parse_flexible("EV6 S3D1").expect("full form parses");
    assert_eq!(full.section, Some(3));
    assert_eq!(full.subsection, Some(1));
}

#[test]
fn parsing_is_case_insensitive_and_trims() {
    let prefix = parse_flexible("  ev6 s3d1  ").expect("lowercase parses");
    assert_eq!(prefix.category, Category::European);
    assert_eq!(prefix.phase, Phase::Operational);
    assert_eq!(prefix.section, Some(3));
}

#[test]
fn rejects_unknown_letters_naming_the_token() {
    match parse_flexible("XV6") {
        Err(PatternError::UnknownCategory(token)) => assert_eq!(token, "X"),
        other => panic!("expected unknown category, got {other:?}"),
    }
    match parse_flexible("EX6") {
        Err(PatternError::UnknownPhase(token)) => assert_eq!(token, "X"),
        other => panic!("expected unknown phase, got {other:?}"),
    }
    match parse_flexible("E V x 3 1") {
        Err(PatternError::InvalidNumber(token)) => assert_eq!(token, "X"),
        other => panic!("expected invalid number, got {other:?}"),
    }
}

#[test]
fn rejects_category_only_forms() {
    // The loose "E6" grammar from an earlier iteration is intentionally
    // gone: category, phase, and number are all mandatory.
    assert!(matches!(
        parse_flexible("E6"),
        Err(PatternError::Unrecognized(_))
    ));
    assert!(matches!(
        parse_flexible("E"),
        Err(PatternError::Unrecognized(_))
    ));
    assert!(matches!(
        parse_flexible(""),
        Err(PatternError::Unrecognized(_))
    ));
}

#[test]
fn rejects_malformed_trailers() {
    assert!(matches!(
        parse_flexible("EV6 3"),
        Err(PatternError::InvalidSection(_))
    ));
    assert!(matches!(
        parse_flexible("EV6 SxD1"),
        Err(PatternError::InvalidSection(_))
    ));
    assert!(matches!(
        parse_flexible("EV6 S3Dx"),
        Err(PatternError::InvalidSubsection(_))
    ));
}

#[test]
fn range_of_full_prefix_is_a_single_key() {
    let range = parse_flexible("EV6 S3D1").expect("parses").to_range();
    assert_eq!(range.from, key(6, 3, 1));
    assert_eq!(range.to, key(6, 3, 2));
}

#[test]
fn range_of_section_prefix_spans_all_subsections() {
    let range = parse_flexible("EV6 S3").expect("parses").to_range();
    assert_eq!(range.from, key(6, 3, 0));
    assert_eq!(range.to, key(6, 4, 0));
}

#[test]
fn range_of_bare_prefix_spans_all_sections() {
    let range = parse_flexible("EV6").expect("parses").to_range();
    assert_eq!(range.from, key(6, 0, 0));
    assert_eq!(range.to, key(7, 0, 0));
}

#[test]
fn range_membership_equals_prefix_match() {
    let prefix = parse_flexible("EV6 S3").expect("parses");
    let range = prefix.to_range();
    let inside = [key(6, 3, 0), key(6, 3, 1), key(6, 3, 65_535)];
    let outside = [
        key(6, 2, 9),
        key(6, 4, 0),
        key(7, 3, 1),
        SectionKey::new(Category::National, Phase::Operational, 6, 3, 1),
        SectionKey::new(Category::European, Phase::Planned, 6, 3, 1),
    ];
    for key in inside {
        assert!(range.from <= key && key < range.to, "{key} should be inside");
        assert!(prefix.matches(&key));
    }
    for key in outside {
        assert!(
            !(range.from <= key && key < range.to),
            "{key} should be outside"
        );
        assert!(!prefix.matches(&key));
    }
}

#[test]
fn range_increment_carries_at_field_maximum() {
    let prefix = PartialSectionKey {
        category: Category::European,
        phase: Phase::Operational,
        number: 6,
        section: Some(u16::MAX),
        subsection: Some(u16::MAX),
    };
    let range = prefix.to_range();
    // The sole member is the maximal subsection key; the exclusive bound
    // carries into the next section of the same road.
    assert_eq!(range.from, key(6, u16::MAX, u16::MAX));
    assert_eq!(range.to, key(7, 0, 0));
    assert!(range.from < range.to);
}
