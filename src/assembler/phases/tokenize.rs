use super::types::{LineError, Loc, Located};

const LINE_COMMENT_CHAR: char = '#';
const INLINE_COMMENT_CHAR: char = '/';
const WORD_COMMENT_CHAR: char = '\'';

struct Scanner<'a> {
    line_no: usize,
    line: &'a str,
    start: Option<usize>,
    tokens: Vec<Located<String>>,
}

impl<'a> Scanner<'a> {
    fn new(line_no: usize, line: &'a str) -> Self {
        Scanner {
            line_no,
            line,
            start: None,
            tokens: Vec::new(),
        }
    }

    fn loc(&self, idx: usize) -> Loc {
        Loc::new(self.line_no, self.line[..idx].chars().count() + 1)
    }

    fn mark(&mut self, idx: usize) {
        if self.start.is_none() {
            self.start = Some(idx);
        }
    }

    fn flush(&mut self, end: usize) {
        if let Some(start) = self.start.take() {
            let tk = Located::with_loc(self.loc(start), self.line[start..end].to_owned());
            self.tokens.push(tk);
        }
    }
}

/// Splits one source line into tokens, dropping comments:
///
/// ```text
/// copy 1.mem 'n 2.reg / inline / push    # line comment
/// ```
pub fn tokenize_line(line_no: usize, line: &str) -> Result<Vec<Located<String>>, Located<LineError>> {
    let mut sc = Scanner::new(line_no, line);
    let mut chars = line.char_indices();

    while let Some((idx, c)) = chars.next() {
        match c {
            LINE_COMMENT_CHAR => {
                sc.flush(idx);
                return Ok(sc.tokens);
            }
            INLINE_COMMENT_CHAR => {
                sc.flush(idx);
                if chars.find(|&(_, c)| c == INLINE_COMMENT_CHAR).is_none() {
                    return Err(Located::with_loc(
                        sc.loc(idx),
                        LineError::Syntax(line[idx..].trim_end().to_owned(), "unterminated inline comment"),
                    ));
                }
            }
            WORD_COMMENT_CHAR => {
                sc.flush(idx);
                chars.find(|&(_, c)| c.is_whitespace());
            }
            c if c.is_whitespace() => sc.flush(idx),
            _ => sc.mark(idx),
        }
    }

    sc.flush(line.len());
    Ok(sc.tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(line: &str) -> Vec<String> {
        tokenize_line(1, line)
            .unwrap()
            .into_iter()
            .map(Located::value)
            .collect()
    }

    #[test]
    fn simple() {
        assert_eq!(values("copy 1.mem 2.reg"), vec!["copy", "1.mem", "2.reg"]);
        assert_eq!(values("  \t copy   1.mem\t2.reg  "), vec!["copy", "1.mem", "2.reg"]);
        assert!(values("").is_empty());
        assert!(values("   ").is_empty());
    }

    #[test]
    fn line_comment() {
        assert_eq!(values("copy 1.mem 2.reg # a comment"), vec!["copy", "1.mem", "2.reg"]);
        assert_eq!(values("copy 1.mem 2.reg#nospace"), vec!["copy", "1.mem", "2.reg"]);
        assert!(values("# only a comment").is_empty());
        assert!(values("#").is_empty());
    }

    #[test]
    fn inline_comment() {
        assert_eq!(
            values("copy / the value / 1.mem /x/2.reg"),
            vec!["copy", "1.mem", "2.reg"]
        );
        assert_eq!(values("copy //1.mem"), vec!["copy", "1.mem"]);

        let err = tokenize_line(4, "copy 1.mem / oops").unwrap_err();
        assert_eq!(err.loc(), Some(Loc::new(4, 12)));
        assert_eq!(
            err.value(),
            LineError::Syntax("/ oops".to_owned(), "unterminated inline comment")
        );
    }

    #[test]
    fn word_comment() {
        assert_eq!(values("copy 1.mem 'n 2.reg"), vec!["copy", "1.mem", "2.reg"]);
        assert_eq!(values("copy 1.mem'n 2.reg"), vec!["copy", "1.mem", "2.reg"]);
        assert_eq!(values("copy 1.mem 'trailing"), vec!["copy", "1.mem"]);
    }

    #[test]
    fn locations() {
        let tks = tokenize_line(7, "  copy 1.mem").unwrap();
        assert_eq!(tks[0].loc(), Some(Loc::new(7, 3)));
        assert_eq!(tks[1].loc(), Some(Loc::new(7, 8)));
    }
}
