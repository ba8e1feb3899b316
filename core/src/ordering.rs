//! Pending sort directives for the next request.
//!
//! Directives are rendered into a single comma-joined header value. The
//! client drains the list while composing every request, so a directive
//! never outlives the call it was set up for.

/// Accumulated `(field, direction)` directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ordering {
    fields: Vec<String>,
}

impl Ordering {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ascending(&mut self, field: &str) {
        self.fields.push(field.to_string());
    }

    /// Descending fields carry `marker` appended to their name.
    pub fn push_descending(&mut self, field: &str, marker: &str) {
        self.fields.push(format!("{field}{marker}"));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render the header value and clear the list.
    ///
    /// Returns `None` when nothing was pending.
    pub fn take_header(&mut self) -> Option<String> {
        let fields = std::mem::take(&mut self.fields);
        if fields.is_empty() {
            None
        } else {
            Some(fields.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_in_call_order() {
        let mut ordering = Ordering::new();
        ordering.push_ascending("widgets.name");
        ordering.push_descending("widgets.created", "-");
        assert_eq!(
            ordering.take_header().as_deref(),
            Some("widgets.name,widgets.created-")
        );
    }

    #[test]
    fn take_clears() {
        let mut ordering = Ordering::new();
        ordering.push_ascending("a");
        assert!(ordering.take_header().is_some());
        assert!(ordering.is_empty());
        assert_eq!(ordering.take_header(), None);
    }
}
