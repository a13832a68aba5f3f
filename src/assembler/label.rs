use super::phases::types::{LabelName, LineError};

const START_MARK: char = '{';
const END_MARK: char = '}';

#[derive(Debug)]
struct Scope {
    id: usize,
    name: String,
    open: bool,
}

/// Names the anonymous labels at the start and end of `{ ... }` blocks, so that
/// `loop` and `break` can refer to the innermost block still open.
#[derive(Debug, Default)]
pub struct LabelGenerator {
    scopes: Vec<Scope>,
}

impl LabelGenerator {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_reserved(name: &str) -> bool {
        name.starts_with(START_MARK) || name.starts_with(END_MARK)
    }

    /// Opens a scope and returns its start label.
    pub fn push_context(&mut self, name: &str) -> LabelName {
        let id = self.scopes.len() + 1;
        self.scopes.push(Scope {
            id,
            name: name.to_owned(),
            open: true,
        });
        format!("{}{}", START_MARK, id)
    }

    /// Closes the innermost open scope called `name` and returns its end label.
    pub fn pop_context(&mut self, name: &str) -> Result<LabelName, LineError> {
        let scope = self
            .scopes
            .iter_mut()
            .rev()
            .find(|scope| scope.open && scope.name == name)
            .ok_or(LineError::UnbalancedLabelContext)?;
        scope.open = false;
        Ok(format!("{}{}", END_MARK, scope.id))
    }

    fn innermost(&self) -> Result<usize, LineError> {
        self.scopes
            .iter()
            .rev()
            .find(|scope| scope.open)
            .map(|scope| scope.id)
            .ok_or(LineError::UnbalancedLabelContext)
    }

    pub fn start_label(&self) -> Result<LabelName, LineError> {
        Ok(format!("{}{}", START_MARK, self.innermost()?))
    }

    pub fn end_label(&self) -> Result<LabelName, LineError> {
        Ok(format!("{}{}", END_MARK, self.innermost()?))
    }
}
