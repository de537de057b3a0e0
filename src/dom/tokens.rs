// ============================================================================
// Token estimation
// ============================================================================

/// Character classes used to split text into subword-like runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Letter,
    Digit,
    Space,
    Symbol,
}

fn classify(c: char) -> CharClass {
    if c.is_alphabetic() {
        CharClass::Letter
    } else if c.is_numeric() {
        CharClass::Digit
    } else if c.is_whitespace() {
        CharClass::Space
    } else {
        CharClass::Symbol
    }
}

/// Count tokens in `text` with a fixed subword stand-in scheme.
///
/// Text is split into maximal runs of letters, digits or whitespace, and
/// single symbols. Letter runs cost one token per 4 bytes, digit runs one per
/// 3 digits, whitespace runs one per 4 characters, symbols one each. This is
/// not the model's real tokenizer, but it grows with it: appending text never
/// lowers the count, and a concatenation never costs more than its parts.
pub fn count_tokens(text: &str) -> usize {
    let mut total = 0;
    let mut run_class: Option<CharClass> = None;
    let mut run_len = 0usize;

    for c in text.chars() {
        let class = classify(c);

        if class == CharClass::Symbol {
            total += run_cost(run_class, run_len);
            run_class = None;
            run_len = 0;
            total += 1;
            continue;
        }

        if run_class != Some(class) {
            total += run_cost(run_class, run_len);
            run_class = Some(class);
            run_len = 0;
        }

        run_len += match class {
            CharClass::Letter => c.len_utf8(),
            _ => 1,
        };
    }

    total + run_cost(run_class, run_len)
}

fn run_cost(class: Option<CharClass>, len: usize) -> usize {
    match class {
        Some(CharClass::Letter) => len.div_ceil(4),
        Some(CharClass::Digit) => len.div_ceil(3),
        Some(CharClass::Space) => len.div_ceil(4),
        Some(CharClass::Symbol) | None => 0,
    }
}
