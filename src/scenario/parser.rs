//! Line-oriented scenario format:
//!
//! ```text
//! # comment
//! A <B|S> <GoodTillCancel|FillAndKill|FillOrKill|GoodForDay|Market> <price> <quantity> <id>
//! M <id> <B|S> <price> <quantity>
//! C <id>
//! R ...
//! ```
//!
//! Blank, `#` and `R` lines are skipped, as is any line starting with another
//! character. A malformed `A`, `M` or `C` line is an error.

use std::str::SplitWhitespace;
use tracing::debug;

use crate::orderbook::{Order, OrderId, OrderModify, OrderType, Price, Quantity, Side};
use crate::scenario::error::ScenarioError;
use crate::scenario::Command;

/// Parse one line; `Ok(None)` means the line carries no command
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<Command>, ScenarioError> {
    let line = line.trim_end();
    let Some(first) = line.chars().next() else {
        return Ok(None);
    };

    let mut fields = Fields::new(line_no, line);
    let command = match first {
        '#' | 'R' => return Ok(None),
        'A' => {
            fields.tag("A")?;
            let side = fields.side()?;
            let order_type = fields.order_type()?;
            let price = fields.number::<Price>("price")?;
            let quantity = fields.quantity()?;
            let id = fields.number::<OrderId>("order id")?;

            let order = match order_type {
                OrderType::Market => Order::new_market(id, side, quantity),
                _ => Order::new(order_type, id, side, price, quantity),
            };
            Command::Add(order)
        }
        'M' => {
            fields.tag("M")?;
            let id = fields.number::<OrderId>("order id")?;
            let side = fields.side()?;
            let price = fields.number::<Price>("price")?;
            let quantity = fields.quantity()?;
            Command::Modify(OrderModify::new(id, side, price, quantity))
        }
        'C' => {
            fields.tag("C")?;
            Command::Cancel(fields.number::<OrderId>("order id")?)
        }
        other => {
            debug!("Skipping line {} with unknown prefix '{}'", line_no, other);
            return Ok(None);
        }
    };

    fields.finish()?;
    Ok(Some(command))
}

struct Fields<'a> {
    line_no: usize,
    iter: SplitWhitespace<'a>,
}

impl<'a> Fields<'a> {
    fn new(line_no: usize, line: &'a str) -> Self {
        Self {
            line_no,
            iter: line.split_whitespace(),
        }
    }

    fn next(&mut self, what: &str) -> Result<&'a str, ScenarioError> {
        self.iter
            .next()
            .ok_or_else(|| ScenarioError::validation(self.line_no, format!("missing {}", what)))
    }

    fn tag(&mut self, expected: &str) -> Result<(), ScenarioError> {
        let tag = self.next("command")?;
        if tag != expected {
            return Err(ScenarioError::validation(
                self.line_no,
                format!("unknown command '{}'", tag),
            ));
        }
        Ok(())
    }

    fn side(&mut self) -> Result<Side, ScenarioError> {
        match self.next("side")? {
            "B" => Ok(Side::Buy),
            "S" => Ok(Side::Sell),
            other => Err(ScenarioError::validation(
                self.line_no,
                format!("unknown side '{}'", other),
            )),
        }
    }

    fn order_type(&mut self) -> Result<OrderType, ScenarioError> {
        match self.next("order type")? {
            "GoodTillCancel" => Ok(OrderType::GoodTillCancel),
            "GoodForDay" => Ok(OrderType::GoodForDay),
            "FillAndKill" => Ok(OrderType::FillAndKill),
            "FillOrKill" => Ok(OrderType::FillOrKill),
            "Market" => Ok(OrderType::Market),
            other => Err(ScenarioError::validation(
                self.line_no,
                format!("unknown order type '{}'", other),
            )),
        }
    }

    fn number<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, ScenarioError> {
        let raw = self.next(what)?;
        if raw.starts_with('-') {
            return Err(ScenarioError::validation(
                self.line_no,
                format!("{} '{}' is negative", what, raw),
            ));
        }
        raw.parse::<T>().map_err(|_| {
            ScenarioError::validation(self.line_no, format!("{} '{}' is not an integer", what, raw))
        })
    }

    fn quantity(&mut self) -> Result<Quantity, ScenarioError> {
        let quantity = self.number::<Quantity>("quantity")?;
        if quantity == 0 {
            return Err(ScenarioError::validation(self.line_no, "quantity must be positive"));
        }
        Ok(quantity)
    }

    fn finish(&mut self) -> Result<(), ScenarioError> {
        match self.iter.next() {
            None => Ok(()),
            Some(extra) => Err(ScenarioError::validation(
                self.line_no,
                format!("unexpected trailing field '{}'", extra),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parse a whole scenario, stopping at the first malformed line
    fn parse_scenario(text: &str) -> Result<Vec<(usize, Command)>, ScenarioError> {
        let mut commands = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if let Some(command) = parse_line(index + 1, line)? {
                commands.push((index + 1, command));
            }
        }
        Ok(commands)
    }

    fn validation_message(line: &str) -> String {
        match parse_line(3, line) {
            Err(ScenarioError::Validation { line: 3, message }) => message,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_add() {
        let command = parse_line(1, "A B GoodTillCancel 100 10 1").unwrap().unwrap();
        match command {
            Command::Add(order) => {
                assert_eq!(order.id, 1);
                assert_eq!(order.side, Side::Buy);
                assert_eq!(order.order_type, OrderType::GoodTillCancel);
                assert_eq!(order.price, 100);
                assert_eq!(order.initial_quantity, 10);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_market_ignores_price() {
        match parse_line(1, "A S Market 12345 7 9").unwrap().unwrap() {
            Command::Add(order) => {
                assert_eq!(order.order_type, OrderType::Market);
                assert_eq!(order.price, 0);
                assert_eq!(order.side, Side::Sell);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_modify_and_cancel() {
        assert_eq!(
            parse_line(1, "M 4 S 101 25").unwrap(),
            Some(Command::Modify(OrderModify::new(4, Side::Sell, 101, 25)))
        );
        assert_eq!(parse_line(1, "C 4").unwrap(), Some(Command::Cancel(4)));
        assert_eq!(parse_line(1, "C 4\r").unwrap(), Some(Command::Cancel(4)));
    }

    #[test]
    fn test_skipped_lines() {
        for line in ["", "# comment", "R 0 0 0", "X whatever", "  leading space"] {
            assert_eq!(parse_line(1, line).unwrap(), None, "line {:?}", line);
        }
    }

    #[test]
    fn test_validation_failures() {
        assert_eq!(validation_message("A B GoodTillCancel 100 10"), "missing order id");
        assert_eq!(validation_message("A Q GoodTillCancel 100 10 1"), "unknown side 'Q'");
        assert_eq!(
            validation_message("A B ImmediateOrCancel 100 10 1"),
            "unknown order type 'ImmediateOrCancel'"
        );
        assert_eq!(
            validation_message("A B GoodTillCancel abc 10 1"),
            "price 'abc' is not an integer"
        );
        assert_eq!(
            validation_message("M 1 B -5 10"),
            "price '-5' is negative"
        );
        assert_eq!(
            validation_message("A B GoodTillCancel 100 0 1"),
            "quantity must be positive"
        );
        assert_eq!(validation_message("C"), "missing order id");
        assert_eq!(validation_message("C 1 2"), "unexpected trailing field '2'");
        assert_eq!(validation_message("Add B GoodTillCancel 1 1 1"), "unknown command 'Add'");
    }

    #[test]
    fn test_parse_scenario_numbers_lines() {
        let text = "# header\nA B GoodTillCancel 100 10 1\n\nC 1\n";
        let commands = parse_scenario(text).unwrap();

        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].0, 2);
        assert_eq!(commands[1], (4, Command::Cancel(1)));
    }

    #[test]
    fn test_parse_scenario_stops_at_bad_line() {
        let text = "A B GoodTillCancel 100 10 1\nC x\nC 1\n";
        assert!(matches!(
            parse_scenario(text),
            Err(ScenarioError::Validation { line: 2, .. })
        ));
    }
}
