mod notch;
