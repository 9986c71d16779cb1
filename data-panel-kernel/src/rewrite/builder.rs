use crate::error::{KernelError, Result};
use crate::rewrite::context::SQLRewriteContext;
use crate::rewrite::token::SQLToken;
use crate::route::context::RouteUnit;

/// Splice the rendered tokens of one route unit into the logic SQL.
pub struct RouteSQLBuilder<'a> {
    context: &'a SQLRewriteContext<'a>,
    route_unit: &'a RouteUnit,
}

impl<'a> RouteSQLBuilder<'a> {
    pub fn new(context: &'a SQLRewriteContext<'a>, route_unit: &'a RouteUnit) -> Self {
        RouteSQLBuilder { context, route_unit }
    }

    pub fn to_sql(&self) -> Result<String> {
        let sql: Vec<char> = self.context.get_sql().chars().collect();
        let tokens = sort_sql_tokens(self.context.get_sql_tokens())?;
        let mut result = String::with_capacity(sql.len());
        let mut cursor = 0usize;
        for each in tokens {
            let start = each.get_start_index();
            // attached text may sit right behind the last character
            if start > sql.len() || each.get_stop_index() >= sql.len() as isize {
                return Err(KernelError::TokenOutOfRange {
                    start,
                    stop: each.get_stop_index(),
                    length: sql.len(),
                });
            }
            result.extend(&sql[cursor..start]);
            result.push_str(&each.render(self.route_unit));
            cursor = (each.get_stop_index() + 1) as usize;
        }
        result.extend(&sql[cursor..]);
        Ok(result)
    }
}

/// Order tokens by position, generation order breaking ties, and reject overlaps.
pub fn sort_sql_tokens(sql_tokens: &[SQLToken]) -> Result<Vec<&SQLToken>> {
    let mut result: Vec<&SQLToken> = sql_tokens.iter().collect();
    result.sort_by_key(|each| (each.get_start_index(), each.get_stop_index()));
    for pair in result.windows(2) {
        let (previous, next) = (pair[0], pair[1]);
        if next.get_start_index() as isize <= previous.get_stop_index() {
            return Err(KernelError::TokenOverlap {
                previous_start: previous.get_start_index(),
                previous_stop: previous.get_stop_index(),
                next_start: next.get_start_index(),
                next_stop: next.get_stop_index(),
            });
        }
    }
    Ok(result)
}

/// `?` placeholders outside of quoted text and comments.
pub fn count_placeholders(sql: &str) -> usize {
    let chars: Vec<char> = sql.chars().collect();
    let mut result = 0;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            quote @ ('\'' | '"' | '`') => {
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\\' && quote != '`' {
                        i += 1;
                    } else if chars[i] == quote {
                        // doubled quote is an escaped quote
                        if chars.get(i + 1) == Some(&quote) {
                            i += 1;
                        } else {
                            break;
                        }
                    }
                    i += 1;
                }
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 1;
            }
            '?' => result += 1,
            _ => {}
        }
        i += 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use crate::binder::{BoundStatementContext, StatementType};
    use crate::error::KernelError;
    use crate::logic::LogicSQL;
    use crate::rewrite::builder::{count_placeholders, sort_sql_tokens, RouteSQLBuilder};
    use crate::rewrite::context::SQLRewriteContext;
    use crate::rewrite::token::SQLToken;
    use crate::route::context::{RouteMapper, RouteUnit};

    #[test]
    fn test_count_placeholders() {
        assert_eq!(count_placeholders("SELECT * FROM t WHERE a = ? AND b IN (?, ?)"), 3);
        assert_eq!(count_placeholders("SELECT '?', \"?\", `?` FROM t WHERE a = ?"), 1);
        assert_eq!(count_placeholders("SELECT 'it''s ?' FROM t -- ?\nWHERE a = ? /* ? */"), 1);
        assert_eq!(count_placeholders("SELECT 'a\\'?' FROM t # ?"), 0);
    }

    #[test]
    fn test_overlapping_tokens() {
        let tokens = vec![SQLToken::literal(10, 15, "x"), SQLToken::literal(14, 20, "y")];
        let err = sort_sql_tokens(&tokens).unwrap_err();
        assert_eq!(err, KernelError::TokenOverlap { previous_start: 10, previous_stop: 15, next_start: 14, next_stop: 20 });
    }

    #[test]
    fn test_token_past_the_end_is_rejected() {
        let statement = BoundStatementContext::builder(StatementType::Select).build();
        let logic_sql = LogicSQL::new(statement, "SELECT 1", vec![]);
        let unit = RouteUnit::new(RouteMapper::new("ds", "ds"), vec![]);

        let context = SQLRewriteContext::with_tokens(&logic_sql, vec![SQLToken::literal(20, 25, "x")]).unwrap();
        let err = RouteSQLBuilder::new(&context, &unit).to_sql().unwrap_err();
        assert_eq!(err, KernelError::TokenOutOfRange { start: 20, stop: 25, length: 8 });

        let context = SQLRewriteContext::with_tokens(&logic_sql, vec![SQLToken::literal(7, 8, "2")]).unwrap();
        assert!(matches!(RouteSQLBuilder::new(&context, &unit).to_sql(), Err(KernelError::TokenOutOfRange { .. })));

        let context = SQLRewriteContext::with_tokens(&logic_sql, vec![SQLToken::insert_columns(8, vec!["a".to_string()])]).unwrap();
        assert_eq!(RouteSQLBuilder::new(&context, &unit).to_sql().unwrap(), "SELECT 1, a");
    }

    #[test]
    fn test_attached_tokens_keep_generation_order() {
        // INSERT INTO t (a) VALUES (?)
        let tokens = vec![
            SQLToken::insert_columns(16, vec!["a_assisted".to_string()]),
            SQLToken::literal(15, 15, "a_cipher"),
            SQLToken::insert_columns(16, vec!["a_plain".to_string()]),
        ];
        assert!(sort_sql_tokens(&tokens).is_ok());
        let statement = BoundStatementContext::builder(StatementType::Insert).build();
        let logic_sql = LogicSQL::new(statement, "INSERT INTO t (a) VALUES (?)", vec![]);
        let context = SQLRewriteContext::with_tokens(&logic_sql, tokens).unwrap();
        let unit = RouteUnit::new(RouteMapper::new("ds", "ds"), vec![]);
        assert_eq!(RouteSQLBuilder::new(&context, &unit).to_sql().unwrap(), "INSERT INTO t (a_cipher, a_assisted, a_plain) VALUES (?)");
    }
}
