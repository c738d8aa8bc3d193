//! ui::graph
//!
//! Renderings of [`GraphView`].
//!
//! # Mermaid
//!
//! Commits point at their parents (`graph BT` draws them bottom to top),
//! each branch gets a class from a fixed palette, and each branch head gets a
//! label node linked to it:
//!
//! ```text
//! graph BT;
//!     classDef branch0 fill:#4c78a8,stroke:#333,stroke-width:2px,color:#fff;
//!     c1("first");
//!     c2("second");
//!     c2 --> c1;
//!     class c2 branch0;
//!     branch_label_id_0["main"]:::branch0;
//!     branch_label_id_0 --o c2;
//! ```

use crate::core::history::GraphView;
use crate::ui::output::SHORT_ID;

/// Fill colors assigned to branches in label order.
const PALETTE: &[&str] = &[
    "4c78a8", "f58518", "54a24b", "e45756", "72b7b2", "b279a2", "9d755d", "eeca3b",
];

/// Node captions are cut to this many characters.
const CAPTION_LEN: usize = 20;

/// Rendering of a repository with no commits.
pub const EMPTY_MERMAID: &str = "graph TD\n    A[No commits yet]";

fn quote(text: &str) -> String {
    text.replace('"', "#quot;")
}

/// Render the graph as Mermaid flowchart source.
pub fn mermaid(view: &GraphView) -> String {
    if view.is_empty() {
        return EMPTY_MERMAID.to_string();
    }

    let mut out = String::from("graph BT;\n");
    for (index, _) in view.labels.iter().enumerate() {
        out.push_str(&format!(
            "    classDef branch{index} fill:#{},stroke:#333,stroke-width:2px,color:#fff;\n",
            PALETTE[index % PALETTE.len()]
        ));
    }

    for node in &view.nodes {
        let caption: String = node.summary.chars().take(CAPTION_LEN).collect();
        out.push_str(&format!("    {}(\"{}\");\n", node.id, quote(&caption)));
        for edge in view.edges.iter().filter(|e| e.child == node.id) {
            out.push_str(&format!("    {} --> {};\n", edge.child, edge.parent));
        }
    }

    for (index, label) in view.labels.iter().enumerate() {
        let node = format!("branch_label_id_{index}");
        out.push_str(&format!("    class {} branch{index};\n", label.head));
        out.push_str(&format!(
            "    {node}[\"{}\"]:::branch{index};\n",
            quote(label.name.as_str())
        ));
        out.push_str(&format!("    {node} --o {};\n", label.head));
    }

    out
}

/// Render the graph as text, newest commit first.
///
/// Each line is `* <id> (<branches>) <summary>`; merges list their parents
/// on an indented line below.
pub fn text(view: &GraphView) -> String {
    if view.is_empty() {
        return "No commits yet".to_string();
    }

    let mut lines = Vec::new();
    for node in view.nodes.iter().rev() {
        let marker = match (node.is_merge, node.is_snapshot) {
            (true, _) => "M",
            (false, true) => "S",
            (false, false) => "*",
        };
        let branches: Vec<String> = view
            .labels
            .iter()
            .filter(|l| l.head == node.id)
            .map(|l| {
                if l.active {
                    format!("{}*", l.name)
                } else {
                    l.name.to_string()
                }
            })
            .collect();
        let refs = if branches.is_empty() {
            String::new()
        } else {
            format!(" ({})", branches.join(", "))
        };
        lines.push(format!(
            "{marker} {}{refs} {}",
            node.id.short(SHORT_ID),
            node.summary
        ));
        if node.is_merge {
            let parents: Vec<String> = view
                .edges
                .iter()
                .filter(|e| e.child == node.id)
                .map(|e| e.parent.short(SHORT_ID).to_string())
                .collect();
            lines.push(format!("  parents: {}", parents.join(" ")));
        }
    }
    lines.join("\n")
}
