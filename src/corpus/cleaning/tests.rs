use super::*;
use crate::corpus::DEFAULT_NOISE_PATTERN;

fn default_filter() -> NoiseFilter {
    NoiseFilter::new(&[DEFAULT_NOISE_PATTERN.to_string()]).expect("default pattern is valid")
}

#[test]
fn twelve_pages_with_five_page_margins_keep_six_and_seven() {
    let pages: Vec<u32> = (1..=12).collect();
    assert_eq!(filter_margins(pages, 5, 5), vec![6, 7]);
}

#[test]
fn margins_covering_the_document_are_clamped() {
    assert_eq!(filter_margins(vec![1, 2, 3], 5, 5), vec![2]);
    assert_eq!(filter_margins(vec![1, 2, 3, 4], 5, 5), vec![2, 3]);
    assert_eq!(filter_margins(vec![1], 5, 5), vec![1]);
    assert_eq!(filter_margins(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10], 5, 5), vec![5, 6]);
}

#[test]
fn margins_of_empty_document() {
    assert!(filter_margins(Vec::<u32>::new(), 5, 5).is_empty());
}

#[test]
fn zero_margins_keep_everything() {
    assert_eq!(filter_margins(vec!["a", "b"], 0, 0), vec!["a", "b"]);
}

#[test]
fn page_number_and_running_header_are_removed() {
    let page = "Median rent rose.\n12\nRegional Housing Report 2023\nVacancy fell.\n";
    assert_eq!(default_filter().clean(page), "Median rent rose.\nVacancy fell.\n");
}

#[test]
fn numbers_inside_sentences_are_kept() {
    let page = "In 2023 the median rent was 1200 dollars.\n";
    assert_eq!(default_filter().clean(page), page);
}

#[test]
fn clean_is_idempotent() {
    let filter = default_filter();
    let inputs = [
        "",
        "no noise at all",
        "1\n2\n3\n4\nbody\n",
        "7\nHeader\n8\nHeader\ntext\n9\n",
        "  42  \nRunning title\nparagraph\n\n43\nRunning title\n",
    ];
    for input in inputs {
        let once = filter.clean(input);
        assert_eq!(filter.clean(&once), once, "input: {input:?}");
    }
}

#[test]
fn stacked_page_numbers_are_removed_to_a_fixpoint() {
    let cleaned = default_filter().clean("1\n2\n3\nbody\n");
    assert_eq!(default_filter().clean(&cleaned), cleaned);
    assert!(!cleaned.starts_with('1'));
}

#[test]
fn invalid_patterns_are_rejected() {
    let error = NoiseFilter::new(&["(".to_string()]).expect_err("should reject");
    assert_eq!(error.pattern, "(");

    let error = NoiseFilter::new(&["x*".to_string()]).expect_err("should reject");
    assert!(error.message.contains("empty"));
}

#[test]
fn empty_filter_is_identity() {
    let filter = NoiseFilter::new(&[]).expect("no patterns is valid");
    assert!(filter.is_empty());
    assert_eq!(filter.clean("12\nheader\n"), "12\nheader\n");
}
