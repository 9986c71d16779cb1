/// Routing hints a client attached to its session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HintValueContext {
    write_route_only: bool,
    shadow: bool,
}

impl HintValueContext {
    pub fn new(write_route_only: bool, shadow: bool) -> Self {
        HintValueContext { write_route_only, shadow }
    }

    pub fn is_write_route_only(&self) -> bool {
        self.write_route_only
    }

    pub fn is_shadow(&self) -> bool {
        self.shadow
    }
}

/// Per connection state the routers look at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionContext {
    in_transaction: bool,
    hint: HintValueContext,
}

impl ConnectionContext {
    pub fn new(in_transaction: bool, hint: HintValueContext) -> Self {
        ConnectionContext { in_transaction, hint }
    }

    pub fn is_in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn get_hint(&self) -> &HintValueContext {
        &self.hint
    }
}
