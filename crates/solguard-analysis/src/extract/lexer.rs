//! Hand-rolled lexer for the contract language subset.
//!
//! Produces a flat token stream with line/column positions so parse errors
//! can point at the offending source location.

use crate::error::AnalysisError;

/// Token kinds. Keywords are lexed as distinct kinds; everything else that
/// looks like a word becomes `Ident`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Int(i128),
    Str(String),

    // Keywords
    Contract,
    Function,
    If,
    Else,
    Return,
    Returns,
    Require,
    Revert,
    Public,
    Private,
    Internal,
    Constant,
    True,
    False,
    TyUint,
    TyBool,
    TyAddress,

    // Punctuation and operators
    LBrace,
    RBrace,
    LParen,
    RParen,
    Semi,
    Comma,
    Dot,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    PlusAssign,
    MinusAssign,
    PlusPlus,
    MinusMinus,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,

    Eof,
}

/// A token with its source position (1-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, AnalysisError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0usize;
    let mut line = 1u32;
    let mut col = 1u32;

    macro_rules! push {
        ($kind:expr, $l:expr, $c:expr) => {
            tokens.push(Token {
                kind: $kind,
                line: $l,
                column: $c,
            })
        };
    }

    while i < chars.len() {
        let c = chars[i];
        let (tl, tc) = (line, col);

        // Whitespace
        if c == '\n' {
            i += 1;
            line += 1;
            col = 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            col += 1;
            continue;
        }

        // Comments: // line and /* block */
        if c == '/' && i + 1 < chars.len() && chars[i + 1] == '/' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && i + 1 < chars.len() && chars[i + 1] == '*' {
            i += 2;
            col += 2;
            loop {
                if i + 1 >= chars.len() {
                    return Err(AnalysisError::parse(tl, tc, "unterminated block comment"));
                }
                if chars[i] == '*' && chars[i + 1] == '/' {
                    i += 2;
                    col += 2;
                    break;
                }
                if chars[i] == '\n' {
                    line += 1;
                    col = 1;
                } else {
                    col += 1;
                }
                i += 1;
            }
            continue;
        }

        // Identifiers and keywords
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
                col += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let kind = match word.as_str() {
                "contract" => TokenKind::Contract,
                "function" => TokenKind::Function,
                "if" => TokenKind::If,
                "else" => TokenKind::Else,
                "return" => TokenKind::Return,
                "returns" => TokenKind::Returns,
                "require" => TokenKind::Require,
                "revert" => TokenKind::Revert,
                "public" => TokenKind::Public,
                "private" => TokenKind::Private,
                "internal" => TokenKind::Internal,
                "constant" => TokenKind::Constant,
                "true" => TokenKind::True,
                "false" => TokenKind::False,
                "uint" | "uint256" => TokenKind::TyUint,
                "bool" => TokenKind::TyBool,
                "address" => TokenKind::TyAddress,
                _ => TokenKind::Ident(word),
            };
            push!(kind, tl, tc);
            continue;
        }

        // Integer literals (decimal only; underscores allowed as separators)
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
                i += 1;
                col += 1;
            }
            let digits: String = chars[start..i].iter().filter(|c| **c != '_').collect();
            let value = digits.parse::<i128>().map_err(|_| {
                AnalysisError::parse(tl, tc, format!("integer literal out of range: {}", digits))
            })?;
            push!(TokenKind::Int(value), tl, tc);
            continue;
        }

        // String literals (double-quoted, no escapes beyond \" needed here)
        if c == '"' {
            i += 1;
            col += 1;
            let mut s = String::new();
            loop {
                if i >= chars.len() {
                    return Err(AnalysisError::parse(tl, tc, "unterminated string literal"));
                }
                match chars[i] {
                    '"' => {
                        i += 1;
                        col += 1;
                        break;
                    }
                    '\n' => {
                        return Err(AnalysisError::parse(tl, tc, "unterminated string literal"))
                    }
                    '\\' if i + 1 < chars.len() && chars[i + 1] == '"' => {
                        s.push('"');
                        i += 2;
                        col += 2;
                    }
                    ch => {
                        s.push(ch);
                        i += 1;
                        col += 1;
                    }
                }
            }
            push!(TokenKind::Str(s), tl, tc);
            continue;
        }

        // Two-character operators first
        if i + 1 < chars.len() {
            let pair: String = [c, chars[i + 1]].iter().collect();
            let kind = match pair.as_str() {
                "==" => Some(TokenKind::EqEq),
                "!=" => Some(TokenKind::NotEq),
                "<=" => Some(TokenKind::Le),
                ">=" => Some(TokenKind::Ge),
                "&&" => Some(TokenKind::AndAnd),
                "||" => Some(TokenKind::OrOr),
                "++" => Some(TokenKind::PlusPlus),
                "--" => Some(TokenKind::MinusMinus),
                "+=" => Some(TokenKind::PlusAssign),
                "-=" => Some(TokenKind::MinusAssign),
                _ => None,
            };
            if let Some(kind) = kind {
                push!(kind, tl, tc);
                i += 2;
                col += 2;
                continue;
            }
        }

        let kind = match c {
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '!' => TokenKind::Bang,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => TokenKind::Assign,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            other => {
                return Err(AnalysisError::parse(
                    tl,
                    tc,
                    format!("unexpected character '{}'", other),
                ))
            }
        };
        push!(kind, tl, tc);
        i += 1;
        col += 1;
    }

    push!(TokenKind::Eof, line, col);
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_declaration() {
        assert_eq!(
            kinds("uint256 public consecutiveWins;"),
            vec![
                TokenKind::TyUint,
                TokenKind::Public,
                TokenKind::Ident("consecutiveWins".into()),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_compound_operators() {
        assert_eq!(
            kinds("a ++ += == != <= >= && ||"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::PlusPlus,
                TokenKind::PlusAssign,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        let toks = kinds("a // line comment\n /* block\n comment */ b");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn underscored_integer_literal() {
        assert_eq!(
            kinds("57_896_044"),
            vec![TokenKind::Int(57_896_044), TokenKind::Eof]
        );
    }

    #[test]
    fn tracks_positions_across_lines() {
        let toks = tokenize("a\n  b").unwrap();
        assert_eq!((toks[0].line, toks[0].column), (1, 1));
        assert_eq!((toks[1].line, toks[1].column), (2, 3));
    }

    #[test]
    fn rejects_unknown_character() {
        let err = tokenize("a # b").unwrap_err();
        assert!(matches!(err, AnalysisError::Parse { line: 1, .. }));
    }
}
