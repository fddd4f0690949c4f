pub mod exec_one;
pub mod expand;
pub mod report;
pub mod run;
