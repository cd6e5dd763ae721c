pub mod inventory_record;
pub mod location;
pub mod movement;
pub mod product;
pub mod stocktake_line;
pub mod stocktake_session;

pub use inventory_record::Entity as InventoryRecord;
pub use location::Entity as Location;
pub use movement::Entity as Movement;
pub use product::Entity as Product;
pub use stocktake_line::Entity as StocktakeLine;
pub use stocktake_session::Entity as StocktakeSession;
