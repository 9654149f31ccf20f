mod registry;
mod tone;
