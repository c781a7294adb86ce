use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LexError {
    #[error("Unexpected character: {0}")]
    UnexpectedChar(char),
    #[error("Invalid number format: {0}")]
    InvalidNumber(String),
    #[error("Unknown duration unit: {0}")]
    UnknownDurationUnit(String),
    #[error("Unterminated string literal")]
    UnterminatedString,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Select,
    From,
    Where,
    And,
    Time,
    Now,

    // Operators
    Eq,  // = or ==
    Gt,  // >
    Lt,  // <
    Gte, // >=
    Lte, // <=
    Minus,

    // Punctuation
    Comma,
    Star,
    LParen,
    RParen,

    // Literals. Double-quoted text is an identifier in this dialect,
    // single-quoted text is a string.
    Identifier(String),
    StringLiteral(String),
    NumberLiteral(i64),
    DurationLiteral(i64), // nanoseconds

    // Special
    EOF,
}

/// Duration unit suffixes accepted in literals like `10m`, in nanoseconds.
const DURATION_UNITS: &[(&str, i64)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 3_600 * 1_000_000_000),
    ("d", 86_400 * 1_000_000_000),
    ("w", 604_800 * 1_000_000_000),
];

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        tokens.push(Token::EOF);
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace();

        if let Some(&c) = self.input.peek() {
            let token = match c {
                '=' => {
                    self.input.next();
                    // Tolerate both `=` and `==` for equality.
                    if let Some('=') = self.input.peek() {
                        self.input.next();
                    }
                    Token::Eq
                }
                '>' => {
                    self.input.next();
                    if let Some('=') = self.input.peek() {
                        self.input.next();
                        Token::Gte
                    } else {
                        Token::Gt
                    }
                }
                '<' => {
                    self.input.next();
                    if let Some('=') = self.input.peek() {
                        self.input.next();
                        Token::Lte
                    } else {
                        Token::Lt
                    }
                }
                '-' => {
                    self.input.next();
                    Token::Minus
                }
                ',' => {
                    self.input.next();
                    Token::Comma
                }
                '*' => {
                    self.input.next();
                    Token::Star
                }
                '(' => {
                    self.input.next();
                    Token::LParen
                }
                ')' => {
                    self.input.next();
                    Token::RParen
                }

                // Quoted literals: double quotes delimit identifiers,
                // single quotes delimit strings.
                '"' => Token::Identifier(self.parse_quoted('"')?),
                '\'' => Token::StringLiteral(self.parse_quoted('\'')?),

                c if c.is_ascii_digit() => self.parse_number_or_duration()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.parse_identifier(),

                c => return Err(LexError::UnexpectedChar(c)),
            };

            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.input.peek() {
            if c.is_whitespace() {
                self.input.next();
            } else {
                break;
            }
        }
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, LexError> {
        self.input.next(); // opening quote
        let mut text = String::new();

        while let Some(c) = self.input.next() {
            match c {
                c if c == quote => return Ok(text),
                '\\' => match self.input.next() {
                    Some(escaped) => text.push(escaped),
                    None => return Err(LexError::UnterminatedString),
                },
                c => text.push(c),
            }
        }

        Err(LexError::UnterminatedString)
    }

    fn parse_number_or_duration(&mut self) -> Result<Token, LexError> {
        let mut number = String::new();

        while let Some(&c) = self.input.peek() {
            if c.is_ascii_digit() {
                number.push(self.input.next().unwrap());
            } else {
                break;
            }
        }

        // A decimal point has no meaning here: number literals only ever
        // carry nanosecond timestamps.
        if let Some('.') = self.input.peek() {
            return Err(LexError::InvalidNumber(format!("{}.", number)));
        }

        let value = number
            .parse::<i64>()
            .map_err(|_| LexError::InvalidNumber(number.clone()))?;

        // A trailing unit turns the number into a duration literal.
        let mut unit = String::new();
        while let Some(&c) = self.input.peek() {
            if c.is_ascii_alphabetic() {
                unit.push(self.input.next().unwrap());
            } else {
                break;
            }
        }

        if unit.is_empty() {
            return Ok(Token::NumberLiteral(value));
        }

        for (suffix, nanos) in DURATION_UNITS {
            if unit == *suffix {
                return Ok(Token::DurationLiteral(value * nanos));
            }
        }
        Err(LexError::UnknownDurationUnit(unit))
    }

    fn parse_identifier(&mut self) -> Token {
        let mut identifier = String::new();

        while let Some(&c) = self.input.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                identifier.push(self.input.next().unwrap());
            } else {
                break;
            }
        }

        match identifier.to_lowercase().as_str() {
            "select" => Token::Select,
            "from" => Token::From,
            "where" => Token::Where,
            "and" => Token::And,
            "time" => Token::Time,
            "now" => Token::Now,
            _ => Token::Identifier(identifier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_tokens() {
        let input = "SELECT * FROM home WHERE ticker = 'bedroom'";
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::Select,
                Token::Star,
                Token::From,
                Token::Identifier("home".to_string()),
                Token::Where,
                Token::Identifier("ticker".to_string()),
                Token::Eq,
                Token::StringLiteral("bedroom".to_string()),
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_time_condition_tokens() {
        let input = "time > now() - 10m";
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::Time,
                Token::Gt,
                Token::Now,
                Token::LParen,
                Token::RParen,
                Token::Minus,
                Token::DurationLiteral(600_000_000_000),
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_quoted_literals_are_distinct() {
        let input = r#"SELECT "temperature" FROM "my measurement" WHERE location = 'Prague'"#;
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::Select,
                Token::Identifier("temperature".to_string()),
                Token::From,
                Token::Identifier("my measurement".to_string()),
                Token::Where,
                Token::Identifier("location".to_string()),
                Token::Eq,
                Token::StringLiteral("Prague".to_string()),
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_number_and_comparison_tokens() {
        let input = "time >= 1709294400000000000 AND time <= 1709294500000000000";
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().unwrap();

        assert_eq!(
            tokens,
            vec![
                Token::Time,
                Token::Gte,
                Token::NumberLiteral(1_709_294_400_000_000_000),
                Token::And,
                Token::Time,
                Token::Lte,
                Token::NumberLiteral(1_709_294_500_000_000_000),
                Token::EOF,
            ]
        );
    }

    #[test]
    fn test_double_equals_tolerated() {
        let mut lexer = Lexer::new("location == 'Prague'");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[1], Token::Eq);
    }

    #[test]
    fn test_error_handling() {
        let mut lexer = Lexer::new("SELECT @ FROM home");
        assert!(matches!(
            lexer.tokenize(),
            Err(LexError::UnexpectedChar('@'))
        ));

        let mut lexer = Lexer::new("time > now() - 10fortnights");
        assert!(matches!(
            lexer.tokenize(),
            Err(LexError::UnknownDurationUnit(_))
        ));

        let mut lexer = Lexer::new("SELECT * FROM 'unterminated");
        assert!(matches!(lexer.tokenize(), Err(LexError::UnterminatedString)));
    }
}
