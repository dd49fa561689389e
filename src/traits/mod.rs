pub(crate) mod active_ops;
