use std::iter::Peekable;
use std::slice::Iter;

use chrono::{DateTime, Duration, Utc};

use super::ast::{FieldSelection, ParseError, Query, TagPredicate, TimeRange};
use super::lexer::{Lexer, Token};

impl Query {
    /// Parses a textual query expression.
    ///
    /// Accepted shape:
    /// `SELECT <fields|*> FROM <measurement> [WHERE <condition> [AND ...]]`
    /// where a condition is either `tag = 'value'`, `time > now() - <dur>`,
    /// or an absolute `time >= <ns>` / `time <= <ns>` bound. Anything else
    /// fails here, before the network is touched.
    pub fn parse(input: &str) -> Result<Query, ParseError> {
        let tokens = Lexer::new(input).tokenize()?;
        Parser::new(&tokens).parse()
    }
}

pub struct Parser<'a> {
    tokens: Peekable<Iter<'a, Token>>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens: tokens.iter().peekable(),
        }
    }

    pub fn parse(&mut self) -> Result<Query, ParseError> {
        self.expect_token(Token::Select)?;
        let selection = self.parse_selection()?;

        self.expect_token(Token::From)?;
        let measurement = self.parse_name()?;

        let mut predicates = Vec::new();
        let mut last: Option<Duration> = None;
        let mut start: Option<DateTime<Utc>> = None;
        let mut end: Option<DateTime<Utc>> = None;

        if self.peek_token() == Some(&&Token::Where) {
            self.next_token()?;
            loop {
                if self.peek_token() == Some(&&Token::Time) {
                    self.next_token()?;
                    self.parse_time_condition(&mut last, &mut start, &mut end)?;
                } else {
                    predicates.push(self.parse_tag_predicate()?);
                }

                if self.peek_token() == Some(&&Token::And) {
                    self.next_token()?;
                } else {
                    break;
                }
            }
        }

        match self.next_token()? {
            Token::EOF => {}
            token => return Err(ParseError::TrailingInput(format!("{:?}", token))),
        }

        let range = match (last, start, end) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(ParseError::InvalidTimeRange(
                    "trailing window and absolute bounds are mutually exclusive".to_string(),
                ))
            }
            (Some(duration), None, None) => Some(TimeRange::Last(duration)),
            (None, Some(start), end) => Some(TimeRange::Absolute { start, end }),
            (None, None, Some(_)) => {
                return Err(ParseError::InvalidTimeRange(
                    "upper bound without lower bound".to_string(),
                ))
            }
            (None, None, None) => None,
        };

        let query = Query {
            measurement,
            selection,
            predicates,
            range,
        };
        query.validate()?;
        Ok(query)
    }

    fn parse_selection(&mut self) -> Result<FieldSelection, ParseError> {
        if self.peek_token() == Some(&&Token::Star) {
            self.next_token()?;
            return Ok(FieldSelection::All);
        }

        let mut fields = Vec::new();
        loop {
            fields.push(self.parse_name()?);

            if self.peek_token() == Some(&&Token::Comma) {
                self.next_token()?;
            } else {
                break;
            }
        }

        Ok(FieldSelection::Fields(fields))
    }

    fn parse_tag_predicate(&mut self) -> Result<TagPredicate, ParseError> {
        let key = self.parse_name()?;
        self.expect_token(Token::Eq)?;
        let value = match self.next_token()? {
            Token::StringLiteral(value) => value.clone(),
            // Bare identifiers are tolerated as tag values.
            Token::Identifier(value) => value.clone(),
            token => return Err(ParseError::UnexpectedToken(format!("{:?}", token))),
        };

        Ok(TagPredicate { key, value })
    }

    /// Parses one `time <op> ...` condition into the bound it constrains.
    fn parse_time_condition(
        &mut self,
        last: &mut Option<Duration>,
        start: &mut Option<DateTime<Utc>>,
        end: &mut Option<DateTime<Utc>>,
    ) -> Result<(), ParseError> {
        match self.next_token()? {
            Token::Gt | Token::Gte => match self.next_token()? {
                Token::Now => {
                    self.expect_token(Token::LParen)?;
                    self.expect_token(Token::RParen)?;
                    self.expect_token(Token::Minus)?;
                    match self.next_token()? {
                        Token::DurationLiteral(nanos) => {
                            *last = Some(Duration::nanoseconds(*nanos));
                            Ok(())
                        }
                        token => Err(ParseError::UnexpectedToken(format!("{:?}", token))),
                    }
                }
                Token::NumberLiteral(nanos) => {
                    *start = Some(DateTime::from_timestamp_nanos(*nanos));
                    Ok(())
                }
                token => Err(ParseError::UnexpectedToken(format!("{:?}", token))),
            },
            Token::Lt | Token::Lte => match self.next_token()? {
                Token::NumberLiteral(nanos) => {
                    *end = Some(DateTime::from_timestamp_nanos(*nanos));
                    Ok(())
                }
                token => Err(ParseError::UnexpectedToken(format!("{:?}", token))),
            },
            token => Err(ParseError::UnexpectedToken(format!("{:?}", token))),
        }
    }

    /// A name position accepts a bare or double-quoted identifier.
    fn parse_name(&mut self) -> Result<String, ParseError> {
        match self.next_token()? {
            Token::Identifier(name) => Ok(name.clone()),
            token => Err(ParseError::UnexpectedToken(format!("{:?}", token))),
        }
    }

    fn next_token(&mut self) -> Result<&Token, ParseError> {
        self.tokens.next().ok_or(ParseError::UnexpectedEnd)
    }

    fn peek_token(&mut self) -> Option<&&Token> {
        self.tokens.peek()
    }

    fn expect_token(&mut self, expected: Token) -> Result<(), ParseError> {
        let token = self.next_token()?;
        if token == &expected {
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken(format!(
                "expected {:?}, got {:?}",
                expected, token
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_star() {
        let query = Query::parse("select * from home").unwrap();

        assert_eq!(query.measurement, "home");
        assert_eq!(query.selection, FieldSelection::All);
        assert!(query.predicates.is_empty());
        assert_eq!(query.range, None);
    }

    #[test]
    fn test_parse_full_query() {
        let query = Query::parse(
            "SELECT temperature FROM my_measurement \
             WHERE location = 'Prague' AND time > now() - 10m",
        )
        .unwrap();

        assert_eq!(query.measurement, "my_measurement");
        assert_eq!(
            query.selection,
            FieldSelection::Fields(vec!["temperature".to_string()])
        );
        assert_eq!(
            query.predicates,
            vec![TagPredicate {
                key: "location".to_string(),
                value: "Prague".to_string(),
            }]
        );
        assert_eq!(query.range, Some(TimeRange::Last(Duration::minutes(10))));
    }

    #[test]
    fn test_parse_field_list_and_quoted_names() {
        let query =
            Query::parse(r#"SELECT "temperature", hum FROM "home" WHERE ticker = 'bedroom'"#)
                .unwrap();

        assert_eq!(
            query.selection,
            FieldSelection::Fields(vec!["temperature".to_string(), "hum".to_string()])
        );
        assert_eq!(query.measurement, "home");
    }

    #[test]
    fn test_parse_absolute_range() {
        let query = Query::parse("SELECT * FROM home WHERE time >= 1000 AND time <= 2000").unwrap();

        assert_eq!(
            query.range,
            Some(TimeRange::Absolute {
                start: DateTime::from_timestamp_nanos(1_000),
                end: Some(DateTime::from_timestamp_nanos(2_000)),
            })
        );
    }

    #[test]
    fn test_parse_round_trips_rendered_statement() {
        let built = Query::builder("my_measurement")
            .field("temperature")
            .tag("location", "Prague")
            .last(Duration::minutes(10))
            .build()
            .unwrap();

        let reparsed = Query::parse(&built.to_statement()).unwrap();
        assert_eq!(built, reparsed);
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(matches!(
            Query::parse("SELEKT * FROM home"),
            Err(ParseError::UnexpectedToken(_))
        ));
        assert!(matches!(
            Query::parse("SELECT * FROM"),
            Err(ParseError::UnexpectedToken(_) | ParseError::UnexpectedEnd)
        ));
        assert!(matches!(
            Query::parse("SELECT * FROM home WHERE"),
            Err(ParseError::UnexpectedToken(_) | ParseError::UnexpectedEnd)
        ));
        assert!(matches!(
            Query::parse("SELECT * FROM home extra"),
            Err(ParseError::TrailingInput(_))
        ));
        assert!(matches!(
            Query::parse("SELECT * FROM home WHERE time > now() - 10q"),
            Err(ParseError::Lex(_))
        ));
    }

    #[test]
    fn test_parse_rejects_conflicting_time_bounds() {
        let result =
            Query::parse("SELECT * FROM home WHERE time > now() - 10m AND time <= 2000");
        assert!(matches!(result, Err(ParseError::InvalidTimeRange(_))));
    }
}
