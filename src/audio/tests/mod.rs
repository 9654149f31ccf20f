mod buffer_proptest;
mod convert;
