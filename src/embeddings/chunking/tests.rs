use super::*;

fn unit_ranges(chunks: &[TextChunk]) -> Vec<Range<usize>> {
    chunks.iter().map(|c| c.units.clone()).collect()
}

struct FailingTokenizer;

impl Tokenizer for FailingTokenizer {
    fn tokenize(&self, _text: &str) -> Result<Vec<Range<usize>>, ChunkingError> {
        Err(ChunkingError::Tokenization("malformed input".to_string()))
    }
}

#[test]
fn character_chunks_without_separators_use_hard_cuts() {
    let text = "a".repeat(2500);
    let splitter = CharacterSplitter::new(1000, 200).expect("valid splitter");

    let chunks = splitter.split(&text);

    assert_eq!(unit_ranges(&chunks), vec![0..1000, 800..1800, 1600..2500]);
    assert!(chunks.iter().all(|c| c.text.chars().count() == c.unit_count()));
}

#[test]
fn character_overlap_is_exact() {
    let text = "Housing starts fell sharply in the third quarter. ".repeat(60)
        + "\n\nIncome trends diverged across the region.\nRenters were hit hardest. "
        + &"Living wage estimates rose. ".repeat(40);
    let splitter = CharacterSplitter::new(300, 60).expect("valid splitter");

    let chunks = splitter.split(&text);
    assert!(chunks.len() > 3);

    for pair in chunks.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        assert_eq!(previous.units.end - 60, next.units.start);
        let tail: String = previous.text.chars().skip(previous.unit_count() - 60).collect();
        let head: String = next.text.chars().take(60).collect();
        assert_eq!(tail, head);
        assert!(previous.unit_count() <= 300);
    }
    assert_eq!(
        chunks.last().map(|c| c.units.end),
        Some(text.chars().count())
    );
}

#[test]
fn paragraph_breaks_win_over_sentence_breaks() {
    let first = "Alpha beta gamma. Delta epsilon zeta. ".repeat(3);
    let text = format!("{first}\n\n{}", "Omega. ".repeat(20));
    let splitter = CharacterSplitter::new(150, 10).expect("valid splitter");

    let chunks = splitter.split(&text);

    assert!(chunks[0].text.ends_with("\n\n"));
    assert_eq!(chunks[0].unit_count(), first.chars().count() + 2);
}

#[test]
fn sentence_breaks_win_over_spaces() {
    let text = format!("{}. {}", "word ".repeat(15).trim_end(), "tail ".repeat(30));
    let splitter = CharacterSplitter::new(100, 10).expect("valid splitter");

    let chunks = splitter.split(&text);

    assert!(chunks[0].text.ends_with(". "));
}

#[test]
fn multibyte_text_is_split_on_characters() {
    let text = "é".repeat(25);
    let splitter = CharacterSplitter::new(10, 2).expect("valid splitter");

    let chunks = splitter.split(&text);

    assert_eq!(unit_ranges(&chunks), vec![0..10, 8..18, 16..25]);
    assert_eq!(chunks[0].text, "é".repeat(10));
}

#[test]
fn short_and_empty_text() {
    let splitter = CharacterSplitter::new(1000, 200).expect("valid splitter");
    assert!(splitter.split("").is_empty());

    let chunks = splitter.split("short text");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "short text");
}

#[test]
fn invalid_character_budgets() {
    assert!(matches!(
        CharacterSplitter::new(0, 0),
        Err(ChunkingError::ZeroBudget)
    ));
    assert!(matches!(
        CharacterSplitter::new(100, 100),
        Err(ChunkingError::OverlapTooLarge {
            overlap: 100,
            budget: 100
        })
    ));
}

#[test]
fn word_tokenizer_spans() {
    let text = "Rent rose 4%, again.";
    let spans = WordTokenizer.tokenize(text).expect("should tokenize");
    let tokens: Vec<&str> = spans.iter().map(|r| &text[r.clone()]).collect();
    assert_eq!(tokens, vec!["Rent", "rose", "4", "%", ",", "again", "."]);
}

#[test]
fn token_windows_overlap_by_ratio() {
    let text = (0..100)
        .map(|i| format!("w{i}"))
        .collect::<Vec<_>>()
        .join(" ");
    let splitter = TokenSplitter::new(Box::new(WordTokenizer), 40, 0.2).expect("valid splitter");
    assert_eq!(splitter.overlap(), 8);

    let chunks = splitter.split(&text).expect("should split");

    assert_eq!(unit_ranges(&chunks), vec![0..40, 32..72, 64..100]);
    assert!(chunks[0].text.starts_with("w0 "));
    assert!(chunks[0].text.ends_with("w39"));
    assert!(chunks[1].text.starts_with("w32 "));
    assert!(chunks[2].text.ends_with("w99"));
}

#[test]
fn default_token_overlap() {
    let splitter = TokenSplitter::from_config(&ChunkingConfig::default()).expect("valid splitter");
    assert_eq!(splitter.overlap(), 51);
}

#[test]
fn token_split_of_blank_text_is_empty() {
    let splitter = TokenSplitter::new(Box::new(WordTokenizer), 16, 0.2).expect("valid splitter");
    assert!(splitter.split("  \n\n ").expect("should split").is_empty());
}

#[test]
fn tokenizer_failure_is_reported() {
    let splitter = TokenSplitter::new(Box::new(FailingTokenizer), 16, 0.2).expect("valid splitter");
    assert!(matches!(
        splitter.split("anything"),
        Err(ChunkingError::Tokenization(_))
    ));
}

#[test]
fn invalid_token_ratios() {
    assert!(matches!(
        TokenSplitter::new(Box::new(WordTokenizer), 16, 1.0),
        Err(ChunkingError::InvalidOverlapRatio(_))
    ));
    assert!(matches!(
        TokenSplitter::new(Box::new(WordTokenizer), 0, 0.2),
        Err(ChunkingError::ZeroBudget)
    ));
}

#[test]
fn missing_tokenizer_file() {
    let config = ChunkingConfig {
        tokenizer_path: Some(PathBuf::from("/definitely/not/here/tokenizer.json")),
        ..ChunkingConfig::default()
    };
    assert!(matches!(
        tokenizer_from_config(&config),
        Err(ChunkingError::TokenizerLoad { .. })
    ));
}

#[test]
fn char_boundary_helpers() {
    let text = "aé";
    assert_eq!(floor_char_boundary(text, 2), 1);
    assert_eq!(ceil_char_boundary(text, 2), 3);
    assert_eq!(ceil_char_boundary(text, 10), 3);
}
