//! LP token support
//!
//! - **LpIntrospector**: decides which addresses are 2-coin LP tokens and
//!   reads the pool state needed to price them
//! - **calculator**: derives LP prices from underlying prices and pool state

mod abi;
mod calculator;
mod introspector;

pub use abi::{MULTICALL3, PROBED_COIN_INDICES};
pub use calculator::{calculate_lp_prices, LpPoolState, PoolReserve};
pub use introspector::{CurveLpIntrospector, LpIntrospector};
