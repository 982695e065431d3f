//! The fatal tier: phases, diagnostics, and the no-return rule.
