pub mod calendar;
pub mod catalog;
pub mod customers;
pub mod dashboard;
pub mod sales;
pub mod verifactu;
