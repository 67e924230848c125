// ABOUTME: Parent-side lifecycle states
// ABOUTME: Running -> ShuttingDown -> Closed, see the data model notes for the transition rules

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentState {
    Running,
    ShuttingDown,
    Closed,
}
