//! 라이선스 표현식 파싱 — 관용적 처리
//!
//! SPDX 라이선스 표현식 문법(식별자, `AND`/`OR`/`WITH`, 괄호, `+` 접미사)을
//! 검사하고, 문법에 맞으면 [`LicenseExpr::Spdx`]로, 맞지 않으면 원문을
//! 그대로 [`LicenseExpr::Custom`]으로 보존합니다.
//!
//! 파싱 실패는 문서 거부 사유가 아닙니다 — 현장의 SBOM에는 비표준
//! 라이선스 문자열이 흔하며, 이를 거부하면 정상 문서 상당수가 수집
//! 불가능해집니다. 라이선스 정책 판단은 평가 플러그인의 몫입니다.

use sbomgate_core::types::LicenseExpr;

/// 라이선스 문자열 하나를 파싱합니다.
///
/// 빈 문자열과 공백뿐인 문자열도 `Custom`으로 보존합니다.
pub fn parse_license(raw: &str) -> LicenseExpr {
    let trimmed = raw.trim();
    if !trimmed.is_empty() && is_valid_expression(trimmed) {
        LicenseExpr::Spdx(trimmed.to_owned())
    } else {
        LicenseExpr::Custom(raw.to_owned())
    }
}

fn is_valid_expression(input: &str) -> bool {
    let tokens = match tokenize(input) {
        Some(tokens) => tokens,
        None => return false,
    };
    let mut parser = Parser { tokens, pos: 0 };
    parser.expression() && parser.pos == parser.tokens.len()
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Ident,
    And,
    Or,
    With,
    Open,
    Close,
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            c if is_idchar(c) => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if is_idchar(c) {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // `+` 접미사는 식별자 끝에서만 허용
                if chars.peek() == Some(&'+') {
                    chars.next();
                }
                tokens.push(match word.as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "WITH" => Token::With,
                    _ => Token::Ident,
                });
            }
            _ => return None,
        }
    }
    Some(tokens)
}

fn is_idchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.'
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: Token) -> bool {
        if self.peek() == Some(&token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // expression := term (("AND" | "OR") term)*
    fn expression(&mut self) -> bool {
        if !self.term() {
            return false;
        }
        while self.eat(Token::And) || self.eat(Token::Or) {
            if !self.term() {
                return false;
            }
        }
        true
    }

    // term := primary ("WITH" ident)?
    fn term(&mut self) -> bool {
        if !self.primary() {
            return false;
        }
        if self.eat(Token::With) {
            return self.eat(Token::Ident);
        }
        true
    }

    // primary := ident | "(" expression ")"
    fn primary(&mut self) -> bool {
        if self.eat(Token::Ident) {
            return true;
        }
        self.eat(Token::Open) && self.expression() && self.eat(Token::Close)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn spdx(s: &str) -> LicenseExpr {
        LicenseExpr::Spdx(s.to_owned())
    }

    fn custom(s: &str) -> LicenseExpr {
        LicenseExpr::Custom(s.to_owned())
    }

    #[test]
    fn simple_identifiers() {
        assert_eq!(parse_license("MIT"), spdx("MIT"));
        assert_eq!(parse_license("Apache-2.0"), spdx("Apache-2.0"));
        assert_eq!(parse_license("GPL-2.0+"), spdx("GPL-2.0+"));
    }

    #[test]
    fn compound_expressions() {
        assert_eq!(parse_license("MIT OR Apache-2.0"), spdx("MIT OR Apache-2.0"));
        assert_eq!(
            parse_license("(MIT OR Apache-2.0) AND BSD-3-Clause"),
            spdx("(MIT OR Apache-2.0) AND BSD-3-Clause")
        );
        assert_eq!(
            parse_license("GPL-2.0-only WITH Classpath-exception-2.0"),
            spdx("GPL-2.0-only WITH Classpath-exception-2.0")
        );
    }

    #[test]
    fn invalid_syntax_preserved_as_custom() {
        assert_eq!(
            parse_license("Proprietary — see LICENSE.txt"),
            custom("Proprietary — see LICENSE.txt")
        );
        assert_eq!(parse_license("MIT OR"), custom("MIT OR"));
        assert_eq!(parse_license("(MIT"), custom("(MIT"));
        assert_eq!(parse_license("MIT Apache-2.0"), custom("MIT Apache-2.0"));
    }

    #[test]
    fn whitespace_trimmed_for_valid_expressions() {
        assert_eq!(parse_license("  MIT  "), spdx("MIT"));
    }

    #[test]
    fn empty_string_is_custom() {
        assert_eq!(parse_license(""), custom(""));
        assert_eq!(parse_license("   "), custom("   "));
    }
}
