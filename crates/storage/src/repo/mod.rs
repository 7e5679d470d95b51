mod integrations;
mod workflows;
