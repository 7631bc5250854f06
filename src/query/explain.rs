//! Score explanation trees.

use serde::Serialize;

/// One node of an explanation tree. The root's value is the document's
/// final score; children decompose it along the query structure.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Explanation {
    /// Score contribution of this node.
    pub value: f32,
    /// Human-readable description of the contribution.
    pub description: String,
    /// Sub-contributions.
    pub details: Vec<Explanation>,
}

impl Explanation {
    /// A leaf node.
    pub fn leaf<S: Into<String>>(value: f32, description: S) -> Explanation {
        Explanation {
            value,
            description: description.into(),
            details: Vec::new(),
        }
    }

    /// An inner node with children.
    pub fn node<S: Into<String>>(
        value: f32,
        description: S,
        details: Vec<Explanation>,
    ) -> Explanation {
        Explanation {
            value,
            description: description.into(),
            details,
        }
    }

    /// Render as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let explanation = Explanation::node(
            3.0,
            "sum of",
            vec![Explanation::leaf(1.0, "a"), Explanation::leaf(2.0, "b")],
        );
        let json = explanation.to_json();
        assert_eq!(json["value"], 3.0);
        assert_eq!(json["details"][1]["description"], "b");
    }
}
