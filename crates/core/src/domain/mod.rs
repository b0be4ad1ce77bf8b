pub mod approval;
pub mod requisition;
