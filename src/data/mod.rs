pub mod building;
pub mod bills;
pub mod validator;
pub mod weather;
pub mod degree_days;

pub use building::BuildingDocument;
pub use bills::{load_bills, BillTable};
pub use validator::DataValidator;
pub use weather::{join_bills_weather, DayOfYearWindow, EpwWeather, TemperatureSeries};
pub use degree_days::{calc_degree_days, DegreeDays};
