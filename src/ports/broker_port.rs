//! Order-routing port for settling decisions with a broker.

use crate::domain::broker::{BrokerAccountInfo, BrokerPosition, OrderRequest, OrderResponse, OrderStatus};
use crate::domain::error::PapertraderError;

pub trait BrokerPort: Send {
    /// Returns whether the session is usable afterwards.
    fn connect(&mut self) -> Result<bool, PapertraderError>;

    fn disconnect(&mut self) -> Result<(), PapertraderError>;

    fn is_connected(&self) -> bool;

    /// Submitting never fails for business reasons; those come back as a
    /// `Rejected` response. `Err` is reserved for transport failures.
    fn place_order(&mut self, order: &OrderRequest) -> Result<OrderResponse, PapertraderError>;

    /// False when the order is unknown.
    fn cancel_order(&mut self, order_id: &str) -> Result<bool, PapertraderError>;

    /// `None` when the order is unknown.
    fn order_status(&self, order_id: &str) -> Result<Option<OrderStatus>, PapertraderError>;

    fn account_info(&self) -> Result<BrokerAccountInfo, PapertraderError>;

    fn positions(&self) -> Result<Vec<BrokerPosition>, PapertraderError>;
}
