pub mod calendar;
pub mod catalog;
pub mod customer;
pub mod dashboard;
pub mod sales;
pub mod sync;
pub mod verifactu;
