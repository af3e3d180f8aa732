use super::reference::ReferenceData;
use crate::workflows::auction::domain::domain_label;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Number,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
}

impl Token {
    fn new(text: String, kind: TokenKind) -> Self {
        Self { text, kind }
    }

    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Splits the second-level label into vocabulary words, digit runs, and unknown
/// fragments. Deterministic for a given domain and reference data.
pub fn tokenize(domain: &str, reference: &ReferenceData) -> Vec<Token> {
    let label = domain_label(domain.trim()).to_lowercase();
    let mut tokens = Vec::new();
    let mut alpha = Vec::new();
    let mut digits = String::new();

    for ch in label.chars() {
        if ch.is_alphabetic() {
            if !digits.is_empty() {
                tokens.push(Token::new(std::mem::take(&mut digits), TokenKind::Number));
            }
            alpha.push(ch);
        } else {
            if !alpha.is_empty() {
                tokens.extend(segment(&alpha, reference));
                alpha.clear();
            }
            if ch.is_ascii_digit() {
                digits.push(ch);
            } else if !digits.is_empty() {
                tokens.push(Token::new(std::mem::take(&mut digits), TokenKind::Number));
            }
        }
    }

    if !alpha.is_empty() {
        tokens.extend(segment(&alpha, reference));
    }
    if !digits.is_empty() {
        tokens.push(Token::new(digits, TokenKind::Number));
    }

    tokens
}

/// Dynamic program minimising (unknown characters, token count) over one
/// alphabetic run. Adjacent unknown characters are merged afterwards.
fn segment(run: &[char], reference: &ReferenceData) -> Vec<Token> {
    let n = run.len();
    let max_word = reference.longest_word().max(1);

    let mut best: Vec<Option<(usize, usize)>> = vec![None; n + 1];
    let mut back: Vec<(usize, bool)> = vec![(0, false); n + 1];
    best[0] = Some((0, 0));

    for end in 1..=n {
        for start in end.saturating_sub(max_word)..end {
            let Some((unknown, count)) = best[start] else {
                continue;
            };
            let piece: String = run[start..end].iter().collect();
            let (candidate, known) = if reference.is_word(&piece) {
                ((unknown, count + 1), true)
            } else if end - start == 1 {
                ((unknown + 1, count + 1), false)
            } else {
                continue;
            };

            if best[end].map_or(true, |current| candidate < current) {
                best[end] = Some(candidate);
                back[end] = (start, known);
            }
        }
    }

    let mut pieces = Vec::new();
    let mut end = n;
    while end > 0 {
        let (start, known) = back[end];
        pieces.push((run[start..end].iter().collect::<String>(), known));
        end = start;
    }
    pieces.reverse();

    let mut tokens: Vec<Token> = Vec::with_capacity(pieces.len());
    for (text, known) in pieces {
        if known {
            tokens.push(Token::new(text, TokenKind::Word));
            continue;
        }
        match tokens.last_mut() {
            Some(last) if last.kind == TokenKind::Unknown => last.text.push_str(&text),
            _ => tokens.push(Token::new(text, TokenKind::Unknown)),
        }
    }
    tokens
}
