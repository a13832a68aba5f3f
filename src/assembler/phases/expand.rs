use super::{
    parse::{self, parse_num},
    types::{LineError, Located, Statement},
};
use crate::assembler::{
    label::LabelGenerator,
    model::Operation,
    sugar::{fmt_imm, is_alias, numeric_imm, SugarTable},
};
use crate::spec::types::hw::Word;

const AS_KEYWORD: &str = "as";
const ASSIGN: &str = "=";
const CALL_ARROW: &str = "<=";

/// Rewrites sugar lines into plain statements, carrying the alias table and
/// the block scopes from one line to the next.
#[derive(Debug, Default)]
pub struct Expander {
    sugar: SugarTable,
    labels: LabelGenerator,
}

impl Expander {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn sugar(&self) -> &SugarTable {
        &self.sugar
    }

    /// Expands one tokenized line. A plain line gives at most one statement,
    /// an alias declaration gives none, and a call gives several.
    pub fn expand(&mut self, tokens: &[Located<String>]) -> Result<Vec<Located<Statement>>, Located<LineError>> {
        if let Some(pos) = tokens.iter().position(|tk| tk.as_value() == CALL_ARROW) {
            return self.call(&tokens[..pos], &tokens[pos], &tokens[pos + 1..]);
        }

        if let Some(first) = tokens.first().filter(|tk| is_alias(tk.as_value())) {
            if let Some(pos) = tokens.iter().position(|tk| tk.as_value() == AS_KEYWORD) {
                self.declare(first, &tokens[..pos], &tokens[pos + 1..])?;
                return Ok(Vec::new());
            }

            if tokens.get(1).map(|tk| tk.as_value().as_str()) == Some(ASSIGN) {
                return self.assign(first, &tokens[2..]);
            }
        }

        let tokens = self.sugar.substitute(tokens)?;
        Ok(self.statement(&tokens)?.into_iter().collect())
    }

    fn statement(&mut self, tokens: &[Located<String>]) -> Result<Option<Located<Statement>>, Located<LineError>> {
        let stmt = parse::parse_line(tokens, &mut self.labels)?;
        if let Some(Statement::Op(op)) = &stmt {
            self.sugar.track(op);
        }
        Ok(stmt.map(|stmt| tokens[0].transfer(stmt)))
    }

    /// `$name as <operand>` or `$a, $b as N.mem` (or `N.reg`).
    fn declare(
        &mut self,
        first: &Located<String>,
        names: &[Located<String>],
        rhs: &[Located<String>],
    ) -> Result<(), Located<LineError>> {
        let joined = names.iter().map(|tk| tk.as_value().as_str()).collect::<Vec<_>>().join(" ");
        let names = joined
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>();

        if let Some(bad) = names.iter().find(|name| !is_alias(name) || name.len() < 2) {
            return Err(first.transfer(LineError::Syntax(
                (*bad).to_owned(),
                "alias names begin with '$' or '&'",
            )));
        }

        let operand = rhs.iter().map(|tk| tk.as_value().as_str()).collect::<Vec<_>>().join(" ");
        if operand.is_empty() {
            return Err(first.transfer(LineError::Syntax(joined.clone(), "missing aliased operand")));
        }

        match names.as_slice() {
            [name] => self.sugar.define(name, &operand),
            names => {
                let reg = self
                    .sugar
                    .resolve_base(&operand)
                    .map_err(|_| rhs[0].transfer(LineError::InvalidOperand(operand.clone())))?;
                self.sugar.define_indexed(names, reg);
            }
        }

        Ok(())
    }

    /// `$name = <operation>` emits the operation, then names its destination.
    fn assign(
        &mut self,
        first: &Located<String>,
        rhs: &[Located<String>],
    ) -> Result<Vec<Located<Statement>>, Located<LineError>> {
        let tokens = self.sugar.substitute(rhs)?;
        let stmt = match self.statement(&tokens)? {
            Some(stmt) => stmt,
            None => {
                return Err(first.transfer(LineError::Syntax(
                    first.as_value().clone(),
                    "missing assigned operation",
                )))
            }
        };

        match stmt.as_value() {
            Statement::Op(Operation { dst, dst_imm, .. }) => {
                let offset = dst_imm.as_num().unwrap_or(0);
                self.sugar.bind_destination(first.as_value(), *dst, offset);
            }
            _ => {
                return Err(first.transfer(LineError::Syntax(
                    first.as_value().clone(),
                    "only an operation can be assigned",
                )))
            }
        }

        Ok(vec![stmt])
    }

    /// `stack[words] <= label(arg, ...)` reserves `words` return slots, pushes
    /// the return address and each argument, then jumps to `label`. The
    /// callee pops its arguments and the return address before coming back.
    fn call(
        &mut self,
        lhs: &[Located<String>],
        arrow: &Located<String>,
        rhs: &[Located<String>],
    ) -> Result<Vec<Located<Statement>>, Located<LineError>> {
        let stack_tk = match lhs {
            [tk] => tk,
            _ => {
                return Err(arrow.transfer(LineError::Syntax(
                    CALL_ARROW.to_owned(),
                    "a call needs exactly one stack operand",
                )))
            }
        };

        let (stack, words) = split_stack(stack_tk.as_value()).map_err(|err| stack_tk.transfer(err))?;
        let reg = self.sugar.resolve_stack(stack).map_err(|err| stack_tk.transfer(err))?;
        let callee = rhs.iter().map(|tk| tk.as_value().as_str()).collect::<Vec<_>>().join(" ");
        let (label, args) = split_callee(&callee).map_err(|err| arrow.transfer(err))?;

        // Arguments see the aliases as they stand before the call moves anything.
        let args = args
            .into_iter()
            .map(|arg| {
                let tokens = arg
                    .split_whitespace()
                    .map(|part| arrow.transfer(part.to_owned()))
                    .collect::<Vec<_>>();
                self.sugar.substitute(&tokens)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let stack_mem = format!("{}.mem", reg.index());
        let stack_reg = format!("{}.reg", reg.index());
        let mut lines: Vec<Vec<String>> = Vec::new();

        if words > 0 {
            lines.push(vec![
                "copy".to_owned(),
                stack_reg.clone(),
                fmt_imm(-words),
                stack_reg,
            ]);
        }

        lines.push(vec![
            "copy".to_owned(),
            "0.reg".to_owned(),
            fmt_imm(args.len() as i32 + 2),
            stack_mem.clone(),
            "push".to_owned(),
        ]);

        let mut delta = 1 + words;
        for arg in &args {
            let mut line = vec!["copy".to_owned()];
            line.extend(relocate_arg(arg, &stack_mem, delta).map_err(|err| arrow.transfer(err))?);
            line.push(stack_mem.clone());
            line.push("push".to_owned());
            lines.push(line);
            delta += 1;
        }

        lines.push(vec![
            "copy".to_owned(),
            "0.reg".to_owned(),
            format!("{}.disp", label),
            "0.reg".to_owned(),
        ]);

        let mut stmts = Vec::with_capacity(lines.len());
        for line in lines {
            log::trace!("call expands to: {}", line.join(" "));
            let tokens = line.into_iter().map(|raw| arrow.transfer(raw)).collect::<Vec<_>>();
            stmts.extend(self.statement(&tokens)?);
        }

        self.sugar.shift(reg, -(args.len() as i32 + 1));
        Ok(stmts)
    }
}

/// `stack[words]`, or a bare `stack` reserving nothing.
fn split_stack(raw: &str) -> Result<(&str, i32), LineError> {
    let open = match raw.find('[') {
        None => return Ok((raw, 0)),
        Some(open) => open,
    };

    let words = raw[open + 1..]
        .strip_suffix(']')
        .and_then(parse_num)
        .filter(|&words| words >= 0 && words <= Word::MAX as i32)
        .ok_or_else(|| LineError::Syntax(raw.to_owned(), "expected stack[words]"))?;
    Ok((&raw[..open], words))
}

/// `label(arg, arg)`, splitting the arguments at commas.
fn split_callee(raw: &str) -> Result<(&str, Vec<&str>), LineError> {
    let malformed = || LineError::Syntax(raw.to_owned(), "expected label(arguments)");
    let open = raw.find('(').ok_or_else(malformed)?;
    let inner = raw[open + 1..].trim_end().strip_suffix(')').ok_or_else(malformed)?;
    let label = raw[..open].trim();
    if label.is_empty() {
        return Err(malformed());
    }

    let args = inner
        .split(',')
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .collect();
    Ok((label, args))
}

/// An argument read through the stack register has to reach past everything
/// the call has pushed so far.
fn relocate_arg(arg: &[Located<String>], stack_mem: &str, delta: i32) -> Result<Vec<String>, LineError> {
    let mut raw = arg.iter().map(|tk| tk.as_value().clone()).collect::<Vec<_>>();
    if raw.first().map(String::as_str) != Some(stack_mem) {
        return Ok(raw);
    }

    let offset = match raw.get(1).and_then(|tk| numeric_imm(tk)) {
        None => delta,
        Some(existing) => {
            let imm = raw.remove(1);
            delta
                .checked_add(existing)
                .ok_or(LineError::InvalidOperand(imm))?
        }
    };
    raw.insert(1, fmt_imm(offset));
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::phases::tokenize::tokenize_line;

    fn run(lines: &[&str]) -> Result<Vec<Statement>, LineError> {
        let mut expander = Expander::new();
        let mut out = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let tokens = tokenize_line(idx + 1, line).unwrap();
            out.extend(expander.expand(&tokens).map_err(Located::value)?.into_iter().map(Located::value));
        }
        Ok(out)
    }

    fn plain(lines: &[&str]) -> Vec<Statement> {
        let mut labels = LabelGenerator::new();
        lines
            .iter()
            .filter_map(|line| {
                let tokens = tokenize_line(1, line).unwrap();
                parse::parse_line(&tokens, &mut labels).unwrap()
            })
            .collect()
    }

    #[test]
    fn aliases_vanish() {
        assert_eq!(
            run(&["$stack as 1.mem", "copy $stack 2.reg", "copy &stack 1.imm &stack"]),
            Ok(plain(&["copy 1.mem 2.reg", "copy 1.reg 1.imm 1.reg"]))
        );
    }

    #[test]
    fn calls_expand() {
        assert_eq!(
            run(&["$stack as 1.mem", "$stack[1] <= factorial(4.val 4.imm)", "factorial:"]),
            Ok(plain(&[
                "copy 1.reg -1.imm 1.reg",
                "copy 0.reg 3.imm 1.mem push",
                "copy 4.val 4.imm 1.mem push",
                "copy 0.reg factorial.disp 0.reg",
                "factorial:",
            ]))
        );

        assert_eq!(
            run(&["1.mem <= f()"]),
            Ok(plain(&["copy 0.reg 2.imm 1.mem push", "copy 0.reg f.disp 0.reg"]))
        );
    }

    #[test]
    fn stack_arguments_reach_past_the_call() {
        assert_eq!(
            run(&["$stack as 2.mem", "$stack[2] <= f(2.mem, 2.mem 1.imm, 3.reg)"]),
            Ok(plain(&[
                "copy 2.reg -2.imm 2.reg",
                "copy 0.reg 5.imm 2.mem push",
                "copy 2.mem 3.imm 2.mem push",
                "copy 2.mem 5.imm 2.mem push",
                "copy 3.reg 2.mem push",
                "copy 0.reg f.disp 0.reg",
            ]))
        );
    }

    #[test]
    fn tracked_aliases_follow_calls() {
        // The call pushes two words and the callee pops both, leaving only the
        // reserved slot on the stack.
        assert_eq!(
            run(&["$a, $b as 1.mem", "1.mem[1] <= f(1.reg)", "copy $a 2.reg"]),
            Ok(plain(&[
                "copy 1.reg -1.imm 1.reg",
                "copy 0.reg 3.imm 1.mem push",
                "copy 1.reg 1.mem push",
                "copy 0.reg f.disp 0.reg",
                "copy 1.mem 1.imm 2.reg",
            ]))
        );
    }

    #[test]
    fn indexed_aliases_count_from_registers() {
        assert_eq!(
            run(&["$a, $b as 2.reg", "copy $b 3.reg", "copy $a 3.reg"]),
            run(&["$a, $b as 2.mem", "copy $b 3.reg", "copy $a 3.reg"])
        );
        assert_eq!(
            run(&["$p as 3.mem", "$a, $b as &p", "copy $b 2.reg"]),
            Ok(plain(&["copy 3.mem 1.imm 2.reg"]))
        );
    }

    #[test]
    fn folded_offsets_must_fit() {
        assert_eq!(
            run(&["$a, $b as 1.mem", "copy $b 7fffffff.imm 2.reg"]),
            Err(LineError::InvalidOperand("7fffffff.imm".to_owned()))
        );
        assert_eq!(
            run(&["1.mem[1] <= f(1.mem 7fffffff.imm)"]),
            Err(LineError::InvalidOperand("7fffffff.imm".to_owned()))
        );
        assert!(matches!(run(&["1.mem[10000] <= f()"]), Err(LineError::Syntax(..))));
    }

    #[test]
    fn assignments_bind_destinations() {
        assert_eq!(
            run(&[
                "$x = copy 4.val 5.imm 1.mem push",
                "copy 4.val 6.imm 1.mem push",
                "copy $x &x",
            ]),
            Ok(plain(&[
                "copy 4.val 5.imm 1.mem push",
                "copy 4.val 6.imm 1.mem push",
                "copy 1.mem 1.imm 1.reg",
            ]))
        );
    }

    #[test]
    fn malformed_sugar() {
        assert_eq!(
            run(&["2.reg <= f()"]),
            Err(LineError::InvalidStackOperand("2.reg".to_owned()))
        );
        assert!(matches!(run(&["1.mem <= f"]), Err(LineError::Syntax(..))));
        assert!(matches!(run(&["1.mem[x] <= f()"]), Err(LineError::Syntax(..))));
        assert_eq!(
            run(&["$a, $b as 4.val"]),
            Err(LineError::InvalidOperand("4.val".to_owned()))
        );
        assert_eq!(
            run(&["$a, $b as 0.reg"]),
            Err(LineError::InvalidOperand("0.reg".to_owned()))
        );
        assert_eq!(
            run(&["copy $missing 1.reg"]),
            Err(LineError::InvalidOperand("$missing".to_owned()))
        );
        assert_eq!(
            run(&["1.mem <= f($missing)"]),
            Err(LineError::InvalidOperand("$missing".to_owned()))
        );
        assert!(matches!(run(&["$x = main:"]), Err(LineError::Syntax(..))));
    }
}
