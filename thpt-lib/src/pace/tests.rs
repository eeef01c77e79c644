use super::*;

fn phase(rate: u32, secs: u64) -> PaceSpec {
    PaceSpec::new(NonZeroU32::new(rate).unwrap(), Duration::from_secs(secs))
}

fn err_kind(input: &str) -> PaceFormatErrorKind {
    match parse(input) {
        Ok(plan) => panic!("expected Err for input {input:?}, got Ok: {plan:?}"),
        Err(err) => err.kind(),
    }
}

#[test]
fn test_parse_reference_descriptor() {
    let plan = parse("100,200:4,100:1,500:60").unwrap();
    assert_eq!(
        plan.phases(),
        &[phase(100, 10), phase(200, 4), phase(100, 1), phase(500, 60)]
    );
}

#[test]
fn test_parse_phase_count_and_default_duration() {
    for (input, expected) in [
        ("1", vec![phase(1, 10)]),
        ("7:3", vec![phase(7, 3)]),
        ("50,50", vec![phase(50, 10), phase(50, 10)]),
        (" 10 : 2 , 20 ", vec![phase(10, 2), phase(20, 10)]),
        ("5:1,6,7:9", vec![phase(5, 1), phase(6, 10), phase(7, 9)]),
    ] {
        let plan = parse(input).unwrap_or_else(|err| panic!("input {input:?}: {err}"));
        assert_eq!(plan.len(), input.matches(',').count() + 1, "input: {input:?}");
        assert_eq!(plan.phases(), expected.as_slice(), "input: {input:?}");
    }
}

#[test]
fn test_parse_rejects_malformed_tokens() {
    for (input, expected) in [
        ("", PaceFormatErrorKind::EmptyDescriptor),
        ("   ", PaceFormatErrorKind::EmptyDescriptor),
        ("abc", PaceFormatErrorKind::InvalidRate),
        ("-5", PaceFormatErrorKind::InvalidRate),
        ("+5", PaceFormatErrorKind::InvalidRate),
        ("5000000000", PaceFormatErrorKind::RateOutOfRange),
        ("10:+5", PaceFormatErrorKind::InvalidDuration),
        ("10:99999999999999999999", PaceFormatErrorKind::DurationOutOfRange),
        ("100,,200", PaceFormatErrorKind::EmptyToken),
        ("100,", PaceFormatErrorKind::EmptyToken),
        ("1:2:3", PaceFormatErrorKind::TooManyFields),
        ("100:", PaceFormatErrorKind::InvalidDuration),
        ("100:1s", PaceFormatErrorKind::InvalidDuration),
        ("0", PaceFormatErrorKind::ZeroRate),
        ("0:5", PaceFormatErrorKind::ZeroRate),
        ("10:0", PaceFormatErrorKind::ZeroDuration),
    ] {
        assert_eq!(err_kind(input), expected, "input: {input:?}");
    }
}

#[test]
fn test_parse_error_identifies_token() {
    let err = parse("100,200:x,300").unwrap_err();
    assert_eq!(err.token(), "200:x");
    assert!(err.to_string().contains("200:x"), "{err}");
}

#[test]
fn test_plan_from_str_and_display() {
    let plan: PacePlan = "100,200:4".parse().unwrap();
    assert_eq!(plan.to_string(), "100:10,200:4");
    assert_eq!(plan.to_string().parse::<PacePlan>().unwrap(), plan);
}

#[test]
fn test_plan_totals() {
    let plan = parse("100,200:4,100:1,500:60").unwrap();
    assert_eq!(plan.total_duration(), Duration::from_secs(75));
    assert_eq!(plan.max_phase_requests(), 30_000);
    assert_eq!(phase(3, 2).expected_requests(), 6);
}

#[test]
fn test_plan_requires_phases() {
    assert!(PacePlan::try_from_phases(Vec::new()).is_none());
    assert_eq!(
        PacePlan::try_from_phases(vec![phase(1, 1)]).unwrap().len(),
        1
    );
}
