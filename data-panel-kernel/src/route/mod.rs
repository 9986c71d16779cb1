//! Decide which data nodes receive a statement.

use crate::error::Result;
use crate::logic::LogicSQL;
use crate::route::context::RouteContext;
use crate::session::ConnectionContext;

pub mod context;
pub mod engine;
pub mod readwrite;
pub mod shadow;
pub mod sharding;
pub mod single;

/**
 * Routing contributed by one rule.
 *
 * The first router to run creates the route units, routers after it only
 * narrow or redirect them.
 */
pub trait SQLRouter {
    fn create_route_context(&self, logic_sql: &LogicSQL, connection: &ConnectionContext) -> Result<RouteContext>;

    fn decorate_route_context(&self, route_context: &mut RouteContext, logic_sql: &LogicSQL, connection: &ConnectionContext) -> Result<()>;
}
