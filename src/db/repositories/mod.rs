mod forecasts;
mod ground_truth;
mod training_pairs;
mod windows;
